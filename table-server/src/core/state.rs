//! 服务器共享状态

use std::sync::Arc;

use crate::cart::CartService;
use crate::core::config::Config;
use crate::db::DbService;
use crate::realtime::{RealtimeChannel, SessionVersions};
use crate::sessions::SessionManager;
use crate::utils::{AppError, AppResult};

/// 全局共享状态 - axum handler 通过 State 提取
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub db: DbService,
    pub channel: RealtimeChannel,
    pub versions: Arc<SessionVersions>,
}

impl ServerState {
    /// 初始化: 打开 RocksDB 数据目录
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let db_dir = config.database_dir();
        std::fs::create_dir_all(&db_dir)
            .map_err(|e| AppError::internal(format!("Failed to create data dir: {}", e)))?;
        let db_path = db_dir.join("tably.db");
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(Self::with_db(config, db))
    }

    /// 内存数据库初始化 (测试用)
    pub async fn initialize_in_memory(config: Config) -> AppResult<Self> {
        let db = DbService::memory()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(Self::with_db(config, db))
    }

    fn with_db(config: Config, db: DbService) -> Self {
        Self {
            config: Arc::new(config),
            db,
            channel: RealtimeChannel::new(),
            versions: Arc::new(SessionVersions::new()),
        }
    }

    /// 会话管理器 (轻量，按需构造)
    pub fn session_manager(&self) -> SessionManager {
        SessionManager::new(
            self.db.db.clone(),
            self.channel.clone(),
            self.versions.clone(),
            self.config.session_ttl(),
            self.config.public_base_url.clone(),
        )
    }

    /// 购物车服务
    pub fn cart_service(&self) -> CartService {
        CartService::new(self.db.db.clone(), self.channel.clone(), self.versions.clone())
    }
}

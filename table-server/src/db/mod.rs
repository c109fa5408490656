//! Database Module
//!
//! 嵌入式 SurrealDB 存储。[`DbService`] 负责打开数据库并选择
//! namespace/database；表结构为 schemaless，行模型见 [`models`]。

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// 打开磁盘数据库 (RocksDB 后端)
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {}", e)))?;
        Self::select_ns(&db).await?;
        Ok(Self { db })
    }

    /// 打开内存数据库 (测试用)
    pub async fn memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory database: {}", e)))?;
        Self::select_ns(&db).await?;
        Ok(Self { db })
    }

    async fn select_ns(db: &Surreal<Db>) -> Result<(), AppError> {
        db.use_ns("tably")
            .use_db("main")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {}", e)))?;
        Ok(())
    }
}

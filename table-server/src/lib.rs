//! Table Server - 桌台会话与共享购物车服务
//!
//! # 架构概述
//!
//! 本模块是 Table Server 的主入口，提供以下核心功能：
//!
//! - **会话生命周期** (`sessions`): 开台 → 校验 → 结账/过期
//! - **共享购物车** (`cart`): 全桌共享、按客人归属的购物车
//! - **实时通道** (`realtime`): 购物车变更的 broadcast 分发
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! table-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── sessions/      # 会话生命周期管理
//! ├── cart/          # 共享购物车服务
//! ├── realtime/      # 变更事件分发
//! ├── db/            # 数据库层
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod cart;
pub mod core;
pub mod db;
pub mod realtime;
pub mod sessions;
pub mod utils;

// Re-export 公共类型
pub use cart::CartService;
pub use core::{Config, Server, ServerState};
pub use realtime::{CartSubscription, RealtimeChannel, SessionVersions, SubscriptionError};
pub use sessions::{OpenOutcome, SessionManager};
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv, 工作目录, 日志)
pub fn setup_environment() -> std::io::Result<Config> {
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let log_dir = std::path::Path::new(&config.work_dir).join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let level = if config.is_production() { "info" } else { "debug" };
    init_logger_with_file(Some(level), log_dir.to_str());

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
  ______      __    __
 /_  __/___ _/ /_  / /_  __
  / / / __ `/ __ \/ / / / /
 / / / /_/ / /_/ / / /_/ /
/_/  \__,_/_.___/_/\__, /
                  /____/
    Table Sessions & Shared Cart
"#
    );
}

//! 过期会话后台清扫任务

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::SessionManager;

/// 启动周期性清扫任务，返回任务句柄
///
/// 每个周期将超过 TTL 的 active 会话标记为 expired 并广播。
/// 通过 [`CancellationToken`] 随服务器一起优雅停机。
pub fn spawn_expiry_sweeper(
    manager: SessionManager,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // 第一个 tick 立即触发，跳过它避免启动时抢占
        ticker.tick().await;
        info!(interval_secs, "Expiry sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match manager.sweep_expired().await {
                        Ok(0) => debug!("Sweep pass: no stale sessions"),
                        Ok(count) => info!(count, "Sweep pass expired sessions"),
                        Err(e) => error!("Sweep pass failed: {}", e),
                    }
                }
            }
        }
    })
}

//! 后台补货 - 业务能力层
//!
//! 题池命中后在后台再生成一道同类题，把生成耗时挪出用户请求。
//! 任务与请求脱钩：不返回结果，失败只记日志。
//! 同时进行的任务数有上限，满了直接跳过，不排队。

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::BackfillConfig;
use crate::models::category::Category;
use crate::services::generation::GenerationFallback;

/// 后台补货调度器
pub struct BackfillScheduler {
    fallback: Arc<GenerationFallback>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    enabled: bool,
}

impl BackfillScheduler {
    pub fn new(fallback: Arc<GenerationFallback>, config: &BackfillConfig) -> Self {
        Self {
            fallback,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            max_concurrent: config.max_concurrent,
            enabled: config.enabled,
        }
    }

    /// 安排一次补货（立即返回）
    pub fn schedule(&self, level: &str, category: Category) {
        if !self.enabled {
            return;
        }

        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "[补货] ⚠️ 后台任务已满 ({}), 跳过 ({}, {})",
                    self.max_concurrent, level, category
                );
                return;
            }
        };

        let fallback = self.fallback.clone();
        let level = level.to_string();
        debug!("[补货] 安排后台补货 ({}, {})", level, category);

        tokio::spawn(async move {
            let _permit = permit;
            match fallback.generate(&level, category, &[]).await {
                Ok(item) => info!("[补货] ✓ 后台补货完成 ({}, {}): {}", level, category, item.id),
                Err(e) => warn!("[补货] ⚠️ 后台补货失败 ({}, {}): {}", level, category, e),
            }
        });
    }

    /// 正在进行的补货任务数
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// 等待当前所有补货任务结束
    pub async fn wait_idle(&self) {
        let Ok(total) = u32::try_from(self.max_concurrent) else {
            return;
        };
        if total == 0 {
            return;
        }
        if let Ok(all) = self.permits.acquire_many(total).await {
            drop(all);
        }
    }
}

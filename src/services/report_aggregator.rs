//! 举报汇总与下架 - 业务能力层
//!
//! 举报无条件追加；同一道题的举报数达到阈值后把题目标记为下架。
//! 下架是单向的，这里从不取消标记。存储故障只记日志，举报被丢弃。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::store::ItemStore;
use crate::models::item::{ItemId, ItemPatch};
use crate::models::report::{Report, ReportOutcome};
use crate::utils::clock::Clock;

/// 版本冲突时最多尝试的次数
const MAX_FLAG_ATTEMPTS: usize = 3;

/// 举报汇总器
pub struct ReportAggregator {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    threshold: u32,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>, threshold: u32) -> Self {
        Self {
            store,
            clock,
            threshold,
        }
    }

    /// 提交一次举报
    pub async fn report(
        &self,
        user_id: &str,
        item_id: &ItemId,
        reason: &str,
        question_index: Option<u32>,
    ) -> ReportOutcome {
        let report = Report {
            user_id: user_id.to_string(),
            item_id: item_id.clone(),
            reason: reason.to_string(),
            question_index,
            timestamp: self.clock.now(),
        };

        if let Err(e) = self.store.append_report(report).await {
            warn!("[举报] ⚠️ 保存举报失败，已丢弃 ({}): {}", item_id, e);
            return ReportOutcome::Dropped;
        }

        let count = match self.store.count_reports(item_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("[举报] ⚠️ 统计举报数失败 ({}): {}", item_id, e);
                return ReportOutcome::Dropped;
            }
        };

        debug!("[举报] 题目 {} 累计举报 {}/{}", item_id, count, self.threshold);
        if count < self.threshold {
            return ReportOutcome::Recorded { count };
        }

        match self.flag(item_id).await {
            Ok(true) => {
                info!("[举报] 🚫 题目 {} 举报数达到 {}，已下架", item_id, count);
                ReportOutcome::Flagged { count }
            }
            Ok(false) => ReportOutcome::AlreadyFlagged { count },
            Err(StoreError::NotFound { .. }) => {
                warn!("[举报] ⚠️ 被举报的题目不存在: {}", item_id);
                ReportOutcome::Recorded { count }
            }
            Err(e) => {
                warn!("[举报] ⚠️ 下架题目失败 ({}): {}", item_id, e);
                ReportOutcome::Recorded { count }
            }
        }
    }

    /// 下架题目；返回 false 表示此前已下架
    async fn flag(&self, item_id: &ItemId) -> StoreResult<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let item = self
                .store
                .get_item(item_id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    id: item_id.to_string(),
                })?;

            if item.flagged {
                return Ok(false);
            }

            match self
                .store
                .update_item(item_id, ItemPatch::flag(), Some(item.version))
                .await
            {
                Ok(_) => return Ok(true),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_FLAG_ATTEMPTS => {
                    debug!("[举报] 题目 {} 版本冲突，重新读取", item_id);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

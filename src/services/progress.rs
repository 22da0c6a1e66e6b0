//! 答题记录 - 业务能力层
//!
//! 追加答题结果，并由此推导用户的已完成题目集合（选题时的排除集）。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::infrastructure::store::ItemStore;
use crate::models::category::Category;
use crate::models::item::ItemId;
use crate::models::progress::ResultRecord;
use crate::utils::clock::Clock;

/// 答题记录
pub struct ProgressLog {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
}

impl ProgressLog {
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 记录一次答题结果
    pub async fn record_result(
        &self,
        user_id: &str,
        item_id: &ItemId,
        category: Category,
        score: u32,
        total: u32,
    ) -> StoreResult<()> {
        self.store
            .append_result(ResultRecord {
                user_id: user_id.to_string(),
                item_id: item_id.clone(),
                category,
                score,
                total,
                timestamp: self.clock.now(),
            })
            .await?;
        debug!("[记录] 用户 {} 完成 {} ({}/{})", user_id, item_id, score, total);
        Ok(())
    }

    /// 用户已完成的题目（读取失败时为空集）
    pub async fn completed_ids(&self, user_id: &str) -> HashSet<ItemId> {
        match self.store.completed_item_ids(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("[记录] ⚠️ 读取用户 {} 的完成记录失败: {}", user_id, e);
                HashSet::new()
            }
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::category::Category;
use crate::models::item::ItemId;

/// 一次答题结果（完成记录的来源）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub user_id: String,
    pub item_id: ItemId,
    pub category: Category,
    pub score: u32,
    pub total: u32,
    pub timestamp: DateTime<Utc>,
}

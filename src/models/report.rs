use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::item::ItemId;

/// 用户提交的题目问题反馈（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub user_id: String,
    pub item_id: ItemId,
    pub reason: String,
    /// 出问题的小题序号（整题反馈时为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_index: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// 举报处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// 已记录，尚未达到下架阈值
    Recorded { count: u32 },
    /// 本次举报触发了下架
    Flagged { count: u32 },
    /// 题目此前已下架
    AlreadyFlagged { count: u32 },
    /// 存储故障，举报被丢弃
    Dropped,
}

//! 题目存储适配器 - 基础设施层
//!
//! 持有唯一的持久化资源，只暴露读写能力，不做业务判断。
//! 各服务通过构造参数拿到 `Arc<dyn ItemStore>`。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::models::category::Category;
use crate::models::item::{Item, ItemId, ItemPatch, NewItem};
use crate::models::progress::ResultRecord;
use crate::models::quota::{BoundedIncrement, UserQuotaState};
use crate::models::report::Report;

/// 题目存储
///
/// 除 `increment_bounded` / `release_bounded` / `decrement_if_positive`
/// 外都是单文档读写，不提供跨文档事务。
#[async_trait]
pub trait ItemStore: Send + Sync {
    // ========== 题目 ==========

    /// 按 (级别, 类别) 扫描未下架的题目，最多 `limit` 条
    async fn scan_items(
        &self,
        level: &str,
        category: Category,
        limit: usize,
    ) -> StoreResult<Vec<Item>>;

    async fn get_item(&self, id: &ItemId) -> StoreResult<Option<Item>>;

    /// 写入新题目，返回带 ID 的完整记录
    async fn put_item(&self, item: NewItem) -> StoreResult<Item>;

    /// 局部更新；给出 `expected_version` 时做乐观锁校验
    async fn update_item(
        &self,
        id: &ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> StoreResult<Item>;

    /// 为某个消费者占用题目直到 `until`；已被他人占用且未过期时返回 false
    async fn try_claim(
        &self,
        id: &ItemId,
        consumer: &str,
        until: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // ========== 通用计数器 ==========

    /// 原子自增，返回自增后的值
    async fn atomic_increment(&self, doc_id: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// 事务性地在值为正时减一，返回是否扣减成功
    async fn decrement_if_positive(&self, doc_id: &str, field: &str) -> StoreResult<bool>;

    // ========== 用户额度 ==========

    async fn get_quota_state(&self, user_id: &str) -> StoreResult<Option<UserQuotaState>>;

    /// 带上限的原子自增（按自然日计数，日期不同先清零）
    async fn increment_bounded(
        &self,
        user_id: &str,
        day: NaiveDate,
        key: &str,
        delta: u32,
        ceiling: u32,
    ) -> StoreResult<BoundedIncrement>;

    /// 归还额度（不低于 0），返回归还后的值
    async fn release_bounded(
        &self,
        user_id: &str,
        day: NaiveDate,
        key: &str,
        delta: u32,
    ) -> StoreResult<u32>;

    /// 设置会员到期时间（`None` 表示取消会员）
    async fn set_premium(&self, user_id: &str, expiry: Option<DateTime<Utc>>) -> StoreResult<()>;

    // ========== 举报 ==========

    async fn append_report(&self, report: Report) -> StoreResult<()>;

    async fn count_reports(&self, item_id: &ItemId) -> StoreResult<u32>;

    // ========== 答题记录 ==========

    async fn append_result(&self, record: ResultRecord) -> StoreResult<()>;

    /// 用户已完成的题目 ID
    async fn completed_item_ids(&self, user_id: &str) -> StoreResult<HashSet<ItemId>>;
}

/// 批改点数所在的文档
pub fn credits_doc(user_id: &str) -> String {
    format!("users/{}", user_id)
}

/// 批改点数字段
pub const CREDITS_FIELD: &str = "correction_credits";

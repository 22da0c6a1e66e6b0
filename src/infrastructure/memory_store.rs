//! 内存存储 - 基础设施层
//!
//! `ItemStore` 的进程内实现。所有状态放在一把 `RwLock` 后面，
//! 因此每个多字段操作都是原子的。用于测试和未接入外部存储时的补货任务；
//! 补货任务通过 `load_items` / `save_items` 把题目保存在 JSON 文件里。

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::store::{credits_doc, ItemStore, CREDITS_FIELD};
use crate::models::category::Category;
use crate::models::item::{Item, ItemId, ItemPatch, NewItem};
use crate::models::progress::ResultRecord;
use crate::models::quota::{BoundedIncrement, UserQuotaState};
use crate::models::report::Report;
use crate::utils::clock::{Clock, SystemClock};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    /// 写入顺序，扫描时按此顺序返回
    insertion_order: Vec<ItemId>,
    claims: HashMap<ItemId, (String, DateTime<Utc>)>,
    counters: HashMap<(String, String), i64>,
    quotas: HashMap<String, UserQuotaState>,
    reports: Vec<Report>,
    results: Vec<ResultRecord>,
}

/// 内存存储
pub struct InMemoryStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    /// 模拟存储故障：置位后所有操作返回 `Unavailable`
    outage: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
            outage: AtomicBool::new(false),
        }
    }

    /// 打开或关闭模拟故障
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    fn check(&self, operation: &'static str) -> StoreResult<()> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(operation, "模拟存储故障"));
        }
        Ok(())
    }

    /// 题目总数（含已下架）
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// 举报总数
    pub async fn report_count(&self) -> usize {
        self.state.read().await.reports.len()
    }

    /// 从 JSON 文件载入题目，返回新载入的数量
    ///
    /// 文件不存在视为空题池；已存在的 id 不会被覆盖。
    pub async fn load_items(&self, path: &Path) -> StoreResult<usize> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("📂 题目文件不存在，从空题池开始: {}", path.display());
                return Ok(0);
            }
            Err(e) => return Err(io_error(path, e)),
        };
        let items: Vec<Item> = serde_json::from_str(&content)?;

        let mut state = self.state.write().await;
        let mut loaded = 0;
        for item in items {
            if state.items.contains_key(&item.id) {
                continue;
            }
            state.insertion_order.push(item.id.clone());
            state.items.insert(item.id.clone(), item);
            loaded += 1;
        }
        info!("📂 已从 {} 载入 {} 道题", path.display(), loaded);
        Ok(loaded)
    }

    /// 把全部题目（含已下架）按写入顺序写入 JSON 文件，返回题目数量
    pub async fn save_items(&self, path: &Path) -> StoreResult<usize> {
        let items: Vec<Item> = {
            let state = self.state.read().await;
            state
                .insertion_order
                .iter()
                .filter_map(|id| state.items.get(id))
                .cloned()
                .collect()
        };
        let json = serde_json::to_string_pretty(&items)?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| io_error(path, e))?;

        info!("💾 已保存 {} 道题到 {}", items.len(), path.display());
        Ok(items.len())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn scan_items(
        &self,
        level: &str,
        category: Category,
        limit: usize,
    ) -> StoreResult<Vec<Item>> {
        self.check("scan_items")?;
        let state = self.state.read().await;
        let items: Vec<Item> = state
            .insertion_order
            .iter()
            .filter_map(|id| state.items.get(id))
            .filter(|item| item.level == level && item.category == category && !item.flagged)
            .take(limit)
            .cloned()
            .collect();
        debug!(
            "扫描题池 ({}, {}): 返回 {} 条",
            level,
            category,
            items.len()
        );
        Ok(items)
    }

    async fn get_item(&self, id: &ItemId) -> StoreResult<Option<Item>> {
        self.check("get_item")?;
        Ok(self.state.read().await.items.get(id).cloned())
    }

    async fn put_item(&self, item: NewItem) -> StoreResult<Item> {
        self.check("put_item")?;
        let stored = Item {
            id: ItemId::generate(),
            level: item.level,
            category: item.category,
            payload: item.payload,
            flagged: false,
            public: item.public,
            created_at: self.clock.now(),
            version: 0,
        };

        let mut state = self.state.write().await;
        state.insertion_order.push(stored.id.clone());
        state.items.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_item(
        &self,
        id: &ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> StoreResult<Item> {
        self.check("update_item")?;
        let mut state = self.state.write().await;
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if let Some(expected) = expected_version {
            if item.version != expected {
                return Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual: item.version,
                });
            }
        }

        if patch.is_empty() {
            return Ok(item.clone());
        }

        if let Some(flagged) = patch.flagged {
            item.flagged = flagged;
        }
        item.version += 1;
        Ok(item.clone())
    }

    async fn try_claim(
        &self,
        id: &ItemId,
        consumer: &str,
        until: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check("try_claim")?;
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if let Some((holder, expires)) = state.claims.get(id) {
            if holder != consumer && *expires > now {
                return Ok(false);
            }
        }
        state
            .claims
            .insert(id.clone(), (consumer.to_string(), until));
        Ok(true)
    }

    async fn atomic_increment(&self, doc_id: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.check("atomic_increment")?;
        let mut state = self.state.write().await;
        let value = state
            .counters
            .entry((doc_id.to_string(), field.to_string()))
            .or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn decrement_if_positive(&self, doc_id: &str, field: &str) -> StoreResult<bool> {
        self.check("decrement_if_positive")?;
        let mut state = self.state.write().await;
        match state
            .counters
            .get_mut(&(doc_id.to_string(), field.to_string()))
        {
            Some(value) if *value > 0 => {
                *value -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_quota_state(&self, user_id: &str) -> StoreResult<Option<UserQuotaState>> {
        self.check("get_quota_state")?;
        let state = self.state.read().await;
        let credits = state
            .counters
            .get(&(credits_doc(user_id), CREDITS_FIELD.to_string()))
            .copied();

        let quota = match (state.quotas.get(user_id), credits) {
            (None, None) => None,
            (Some(quota), credits) => Some(UserQuotaState {
                credits: credits.unwrap_or(0),
                ..quota.clone()
            }),
            (None, Some(credits)) => Some(UserQuotaState {
                credits,
                ..UserQuotaState::new(user_id)
            }),
        };
        Ok(quota)
    }

    async fn increment_bounded(
        &self,
        user_id: &str,
        day: NaiveDate,
        key: &str,
        delta: u32,
        ceiling: u32,
    ) -> StoreResult<BoundedIncrement> {
        self.check("increment_bounded")?;
        let mut state = self.state.write().await;
        let quota = state
            .quotas
            .entry(user_id.to_string())
            .or_insert_with(|| UserQuotaState::new(user_id));
        Ok(quota.apply_bounded(day, key, delta, ceiling))
    }

    async fn release_bounded(
        &self,
        user_id: &str,
        day: NaiveDate,
        key: &str,
        delta: u32,
    ) -> StoreResult<u32> {
        self.check("release_bounded")?;
        let mut state = self.state.write().await;
        let quota = state
            .quotas
            .entry(user_id.to_string())
            .or_insert_with(|| UserQuotaState::new(user_id));
        Ok(quota.release(day, key, delta))
    }

    async fn set_premium(&self, user_id: &str, expiry: Option<DateTime<Utc>>) -> StoreResult<()> {
        self.check("set_premium")?;
        let mut state = self.state.write().await;
        let quota = state
            .quotas
            .entry(user_id.to_string())
            .or_insert_with(|| UserQuotaState::new(user_id));
        quota.is_premium = expiry.is_some();
        quota.premium_expiry = expiry;
        Ok(())
    }

    async fn append_report(&self, report: Report) -> StoreResult<()> {
        self.check("append_report")?;
        self.state.write().await.reports.push(report);
        Ok(())
    }

    async fn count_reports(&self, item_id: &ItemId) -> StoreResult<u32> {
        self.check("count_reports")?;
        let state = self.state.read().await;
        let count = state
            .reports
            .iter()
            .filter(|report| &report.item_id == item_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn append_result(&self, record: ResultRecord) -> StoreResult<()> {
        self.check("append_result")?;
        self.state.write().await.results.push(record);
        Ok(())
    }

    async fn completed_item_ids(&self, user_id: &str) -> StoreResult<HashSet<ItemId>> {
        self.check("completed_item_ids")?;
        let state = self.state.read().await;
        Ok(state
            .results
            .iter()
            .filter(|record| record.user_id == user_id)
            .map(|record| record.item_id.clone())
            .collect())
    }
}

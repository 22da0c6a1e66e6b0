//! 题池选择 - 业务能力层
//!
//! 从 (级别, 类别) 题池中随机挑一道用户没做过、未下架的题。
//! 随机而不是取最新，避免所有人拿到同一道题。
//!
//! 存储故障按未命中处理，由调用方走生成兜底。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::infrastructure::store::ItemStore;
use crate::models::category::Category;
use crate::models::item::{Item, ItemId};
use crate::utils::clock::Clock;

/// 题池选择器
pub struct PoolSelector {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    scan_limit: usize,
    lease: Option<Duration>,
}

impl PoolSelector {
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>, config: &PoolConfig) -> Self {
        let lease = config
            .lease_secs
            .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
        Self {
            store,
            clock,
            scan_limit: config.scan_limit,
            lease,
        }
    }

    /// 随机选一道不在 `exclude` 中的题；没有候选时返回 `None`
    ///
    /// 不做占用，并发请求可能拿到同一道题。
    pub async fn select(
        &self,
        level: &str,
        category: Category,
        exclude: &HashSet<ItemId>,
    ) -> Option<Item> {
        let candidates = self.candidates(level, category, exclude).await;
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    /// 为某个消费者选题
    ///
    /// 配置了租约时会占用选中的题，跳过被他人占用的题；否则同 `select`。
    pub async fn select_for(
        &self,
        consumer: &str,
        level: &str,
        category: Category,
        exclude: &HashSet<ItemId>,
    ) -> Option<Item> {
        let Some(lease) = self.lease else {
            return self.select(level, category, exclude).await;
        };

        let mut candidates = self.candidates(level, category, exclude).await;
        candidates.shuffle(&mut rand::thread_rng());

        let until = self.clock.now() + lease;
        for item in candidates {
            match self.store.try_claim(&item.id, consumer, until).await {
                Ok(true) => return Some(item),
                Ok(false) => debug!("[选题] 题目 {} 已被占用，跳过", item.id),
                Err(e) => {
                    warn!("[选题] ⚠️ 占用题目失败，按未命中处理: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn candidates(
        &self,
        level: &str,
        category: Category,
        exclude: &HashSet<ItemId>,
    ) -> Vec<Item> {
        let scanned = match self.store.scan_items(level, category, self.scan_limit).await {
            Ok(items) => items,
            Err(e) => {
                warn!("[选题] ⚠️ 扫描题池失败 ({}, {})，按未命中处理: {}", level, category, e);
                return Vec::new();
            }
        };

        let total = scanned.len();
        let candidates: Vec<Item> = scanned
            .into_iter()
            .filter(|item| item.is_selectable() && !exclude.contains(&item.id))
            .collect();

        debug!(
            "[选题] ({}, {}) 扫描 {} 条，可选 {} 条",
            level,
            category,
            total,
            candidates.len()
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::scripted::sample_payload;
    use crate::infrastructure::InMemoryStore;
    use crate::models::item::NewItem;
    use crate::utils::clock::FixedClock;

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::morning());
            Self {
                store: Arc::new(InMemoryStore::with_clock(clock.clone())),
                clock,
            }
        }

        fn selector(&self, config: &PoolConfig) -> PoolSelector {
            PoolSelector::new(self.store.clone(), self.clock.clone(), config)
        }

        async fn seed(&self, category: Category, n: usize) -> Vec<Item> {
            let mut items = Vec::new();
            for i in 0..n {
                let item = self
                    .store
                    .put_item(NewItem {
                        level: "C1".to_string(),
                        category,
                        payload: sample_payload(category, "C1", &[], i),
                        public: true,
                    })
                    .await
                    .unwrap();
                items.push(item);
            }
            items
        }
    }

    #[tokio::test]
    async fn test_empty_pool_is_a_miss() {
        let fx = Fixture::new();
        let selector = fx.selector(&PoolConfig::default());

        let picked = selector
            .select("C1", Category::ReadingAndUseOfLanguage1, &HashSet::new())
            .await;
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn test_only_remaining_candidate_is_returned() {
        let fx = Fixture::new();
        let items = fx.seed(Category::ReadingAndUseOfLanguage1, 3).await;
        let selector = fx.selector(&PoolConfig::default());

        let exclude: HashSet<ItemId> = items[..2].iter().map(|item| item.id.clone()).collect();
        for _ in 0..10 {
            let picked = selector
                .select("C1", Category::ReadingAndUseOfLanguage1, &exclude)
                .await
                .unwrap();
            assert_eq!(picked.id, items[2].id);
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_a_miss() {
        let fx = Fixture::new();
        fx.seed(Category::Listening2, 1).await;
        fx.store.set_outage(true);
        let selector = fx.selector(&PoolConfig::default());

        assert!(selector
            .select("C1", Category::Listening2, &HashSet::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_lease_keeps_item_away_from_other_consumers() {
        let fx = Fixture::new();
        let items = fx.seed(Category::Writing1, 1).await;
        let config = PoolConfig {
            lease_secs: Some(60),
            ..Default::default()
        };
        let selector = fx.selector(&config);
        let none = HashSet::new();

        let first = selector.select_for("u1", "C1", Category::Writing1, &none).await;
        assert_eq!(first.map(|item| item.id), Some(items[0].id.clone()));
        assert!(selector
            .select_for("u2", "C1", Category::Writing1, &none)
            .await
            .is_none());

        fx.clock.advance(Duration::seconds(61));
        assert!(selector
            .select_for("u2", "C1", Category::Writing1, &none)
            .await
            .is_some());
    }
}

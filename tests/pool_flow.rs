use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio_test::{assert_err, assert_ok};

use exercise_pool::clients::scripted::sample_payload;
use exercise_pool::config::{Config, FailurePolicy};
use exercise_pool::models::item::NewItem;
use exercise_pool::services::PoolSelector;
use exercise_pool::utils::{logging, FixedClock};
use exercise_pool::{
    Category, ExamAssembler, InMemoryStore, Item, ItemCtx, ItemFlow, ItemId, ItemSource,
    ItemStore, ReportAggregator, ReportOutcome, ScriptedGenerator, ServeError,
};

const READING1: &str = "reading_and_use_of_language1";

/// 测试用的完整装配：内存存储 + 脚本化生成器 + 可拨动时钟
struct Harness {
    clock: Arc<FixedClock>,
    store: Arc<InMemoryStore>,
    generator: Arc<ScriptedGenerator>,
    config: Config,
    flow: Arc<ItemFlow>,
}

impl Harness {
    fn new(generator: ScriptedGenerator) -> Self {
        Self::with_config(generator, Config::default())
    }

    fn with_config(generator: ScriptedGenerator, config: Config) -> Self {
        logging::init(false);

        let clock = Arc::new(FixedClock::morning());
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let generator = Arc::new(generator);
        let flow = Arc::new(ItemFlow::new(
            store.clone(),
            generator.clone(),
            clock.clone(),
            &config,
        ));

        Self {
            clock,
            store,
            generator,
            config,
            flow,
        }
    }

    fn selector(&self) -> PoolSelector {
        PoolSelector::new(self.store.clone(), self.clock.clone(), &self.config.pool)
    }

    fn reports(&self) -> ReportAggregator {
        ReportAggregator::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.reports.flag_threshold,
        )
    }

    fn assembler(&self) -> ExamAssembler {
        ExamAssembler::new(self.flow.clone(), self.config.exam.clone())
    }

    async fn seed(&self, category: Category, n: usize) -> Vec<Item> {
        let mut items = Vec::with_capacity(n);
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
                .expect("写入题目失败");
            items.push(item);
        }
        items
    }

    async fn count_today(&self, user_id: &str, key: &str) -> u32 {
        self.flow
            .quota()
            .get_quota_state(user_id)
            .await
            .expect("读取额度失败")
            .counts_today
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

fn no_backfill() -> Config {
    let mut config = Config::default();
    config.backfill.enabled = false;
    config
}

fn ids(items: &[Item]) -> HashSet<ItemId> {
    items.iter().map(|item| item.id.clone()).collect()
}

// ========== 选题 ==========

#[tokio::test]
async fn test_empty_pool_generates_persists_and_returns() {
    let h = Harness::new(ScriptedGenerator::new());
    let none = HashSet::new();

    assert!(h
        .selector()
        .select("C1", Category::ReadingAndUseOfLanguage1, &none)
        .await
        .is_none());

    let ctx = ItemCtx::new("u1", "C1", Category::ReadingAndUseOfLanguage1);
    let delivered = assert_ok!(h.flow.serve(&ctx, &none).await);

    assert_eq!(delivered.source, ItemSource::Generated);
    assert_eq!(h.generator.calls_for(Category::ReadingAndUseOfLanguage1), 1);
    let stored = h.store.get_item(&delivered.item.id).await.unwrap();
    assert_eq!(stored, Some(delivered.item));
}

#[tokio::test]
async fn test_single_eligible_candidate_is_chosen() {
    let h = Harness::new(ScriptedGenerator::new());
    let items = h.seed(Category::ReadingAndUseOfLanguage1, 3).await;
    let completed = ids(&items[..2]);

    let picked = h
        .selector()
        .select("C1", Category::ReadingAndUseOfLanguage1, &completed)
        .await
        .expect("应该命中");
    assert_eq!(picked.id, items[2].id);
}

#[tokio::test]
async fn test_completed_items_are_never_served() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());
    let items = h.seed(Category::Listening1, 10).await;
    let completed = ids(&items[..7]);
    let selector = h.selector();

    for _ in 0..100 {
        let picked = selector
            .select("C1", Category::Listening1, &completed)
            .await
            .expect("应该命中");
        assert!(!completed.contains(&picked.id));
    }
}

#[tokio::test]
async fn test_exam_skips_items_in_results_log() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());
    let done = h.seed(Category::ReadingAndUseOfLanguage2, 1).await;
    h.flow
        .progress()
        .record_result("u1", &done[0].id, Category::ReadingAndUseOfLanguage2, 6, 8)
        .await
        .unwrap();

    let exam = h.assembler().assemble_exam("u1", "C1").await.unwrap();
    let part2 = exam
        .ordered_parts
        .iter()
        .find(|item| item.category == Category::ReadingAndUseOfLanguage2)
        .expect("第二部分应该存在");
    assert_ne!(part2.id, done[0].id);
}

// ========== 额度 ==========

#[tokio::test]
async fn test_quota_allows_up_to_limit_then_denies() {
    let h = Harness::new(ScriptedGenerator::new());
    let quota = h.flow.quota();

    assert!(quota.try_consume("u1", READING1, 1).await);
    assert!(quota.try_consume("u1", READING1, 1).await);
    assert_eq!(h.count_today("u1", READING1).await, 2);

    assert!(quota.try_consume("u1", READING1, 1).await);
    assert_eq!(h.count_today("u1", READING1).await, 3);

    assert!(!quota.try_consume("u1", READING1, 1).await);
    assert_eq!(h.count_today("u1", READING1).await, 3);
}

#[tokio::test]
async fn test_quota_count_stays_within_bounds() {
    let h = Harness::new(ScriptedGenerator::new());
    let quota = h.flow.quota();
    let limit = h.config.quota.limit_for(READING1);

    for cost in [2, 2, 1, 3, 1, 0, 2] {
        quota.try_consume("u1", READING1, cost).await;
        let count = h.count_today("u1", READING1).await;
        assert!(count <= limit, "计数 {} 超过上限 {}", count, limit);
    }
    assert_eq!(h.count_today("u1", READING1).await, 3);
}

#[tokio::test]
async fn test_premium_bypasses_without_counting() {
    let h = Harness::new(ScriptedGenerator::new());
    let quota = h.flow.quota();
    quota.grant_premium("vip", 30).await.unwrap();

    for _ in 0..10 {
        assert!(quota.try_consume("vip", READING1, 1).await);
    }
    assert_eq!(h.count_today("vip", READING1).await, 0);

    h.clock.advance(ChronoDuration::days(31));
    let snapshot = quota.get_quota_state("vip").await.unwrap();
    assert!(!snapshot.is_premium);
    assert!(quota.try_consume("vip", READING1, 1).await);
    assert_eq!(h.count_today("vip", READING1).await, 1);
}

#[tokio::test]
async fn test_new_day_resets_quota() {
    let h = Harness::new(ScriptedGenerator::new());
    let quota = h.flow.quota();

    for _ in 0..3 {
        assert!(quota.try_consume("u1", READING1, 1).await);
    }
    assert!(!quota.try_consume("u1", READING1, 1).await);

    h.clock.advance(ChronoDuration::days(1));
    assert_eq!(h.count_today("u1", READING1).await, 0);
    assert!(quota.try_consume("u1", READING1, 1).await);
    assert_eq!(h.count_today("u1", READING1).await, 1);
}

#[tokio::test]
async fn test_fail_closed_outage_reports_quota_exceeded() {
    let mut config = no_backfill();
    config.quota.failure_policy = FailurePolicy::FailClosed;
    let h = Harness::with_config(ScriptedGenerator::new(), config);
    h.store.set_outage(true);

    let ctx = ItemCtx::new("u1", "C1", Category::Listening2);
    let err = assert_err!(h.flow.serve(&ctx, &HashSet::new()).await);
    assert!(err.is_quota_exceeded());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_fail_open_outage_still_serves_speaking_fallback() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());
    h.store.set_outage(true);

    let ctx = ItemCtx::new("u1", "C1", Category::Speaking1);
    let delivered = assert_ok!(h.flow.serve(&ctx, &HashSet::new()).await);
    assert_eq!(delivered.source, ItemSource::Fallback);

    let text = ItemCtx::new("u1", "C1", Category::Writing1);
    let err = assert_err!(h.flow.serve(&text, &HashSet::new()).await);
    assert!(matches!(err, ServeError::Unavailable { .. }));
}

// ========== 举报下架 ==========

#[tokio::test]
async fn test_reported_item_leaves_the_pool_for_good() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());
    let x = h.seed(Category::ReadingAndUseOfLanguage4, 1).await.remove(0);
    let reports = h.reports();

    for (i, user) in ["u1", "u2", "u3"].iter().enumerate() {
        let outcome = reports.report(user, &x.id, "answer key is wrong", None).await;
        if i < 2 {
            assert!(matches!(outcome, ReportOutcome::Recorded { .. }));
        } else {
            assert_eq!(outcome, ReportOutcome::Flagged { count: 3 });
        }
    }

    let selector = h.selector();
    for _ in 0..20 {
        assert!(selector
            .select("C1", Category::ReadingAndUseOfLanguage4, &HashSet::new())
            .await
            .is_none());
    }

    let ctx = ItemCtx::new("u9", "C1", Category::ReadingAndUseOfLanguage4);
    let delivered = h.flow.serve(&ctx, &HashSet::new()).await.unwrap();
    assert_eq!(delivered.source, ItemSource::Generated);
    assert_ne!(delivered.item.id, x.id);
    assert!(h.store.get_item(&x.id).await.unwrap().unwrap().flagged);
}

// ========== 后台补货 ==========

#[tokio::test]
async fn test_hit_triggers_exactly_one_backfill() {
    let h = Harness::new(ScriptedGenerator::new());
    h.seed(Category::Listening4, 1).await;

    let ctx = ItemCtx::new("u1", "C1", Category::Listening4);
    let delivered = h.flow.serve(&ctx, &HashSet::new()).await.unwrap();
    assert_eq!(delivered.source, ItemSource::Pool);

    h.flow.backfill().wait_idle().await;
    assert_eq!(h.generator.calls_for(Category::Listening4), 1);
    assert_eq!(h.store.item_count().await, 2);
}

// ========== 组卷 ==========

#[tokio::test]
async fn test_exam_parts_follow_canonical_order() {
    let mut generator = ScriptedGenerator::new();
    for (i, category) in Category::EXAM_STRUCTURE.iter().enumerate() {
        let delay = Duration::from_millis(20 * (8 - i as u64));
        generator = generator.with_delay(*category, delay);
    }
    let h = Harness::with_config(generator, no_backfill());

    let exam = h.assembler().assemble_exam("u1", "C1").await.unwrap();

    assert!(exam.is_complete());
    assert_eq!(exam.categories(), Category::EXAM_STRUCTURE.to_vec());
}

#[tokio::test]
async fn test_exam_omits_only_the_failed_part() {
    let generator = ScriptedGenerator::new().failing_on(Category::ReadingAndUseOfLanguage5);
    let h = Harness::with_config(generator, no_backfill());

    let exam = h.assembler().assemble_exam("u1", "C1").await.unwrap();

    assert_eq!(exam.ordered_parts.len(), 7);
    assert_eq!(exam.missing, vec![Category::ReadingAndUseOfLanguage5]);
    let expected: Vec<Category> = Category::EXAM_STRUCTURE
        .into_iter()
        .filter(|c| *c != Category::ReadingAndUseOfLanguage5)
        .collect();
    assert_eq!(exam.categories(), expected);
}

#[tokio::test]
async fn test_exam_uses_pool_items_when_available() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());
    let pooled = h.seed(Category::ReadingAndUseOfLanguage8, 1).await;

    let exam = h.assembler().assemble_exam("u1", "C1").await.unwrap();

    assert!(exam.ordered_parts.iter().any(|item| item.id == pooled[0].id));
    assert_eq!(h.generator.calls_for(Category::ReadingAndUseOfLanguage8), 0);
    assert_eq!(h.generator.calls(), 7);
}

#[tokio::test]
async fn test_exam_quota_is_separate_from_categories() {
    let h = Harness::with_config(ScriptedGenerator::new(), no_backfill());

    assert_ok!(h.assembler().assemble_exam("u1", "C1").await);
    assert_eq!(h.count_today("u1", "exam").await, 5);
    assert_eq!(h.count_today("u1", READING1).await, 0);

    let err = assert_err!(h.assembler().assemble_exam("u1", "C1").await);
    assert!(err.is_quota_exceeded());
}

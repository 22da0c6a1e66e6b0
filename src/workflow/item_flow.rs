//! 单题出题流程 - 流程层
//!
//! 核心职责：定义"出一道题"的完整流程
//!
//! 流程顺序：
//! 1. 额度闸门（不足直接返回 `QuotaExceeded`）
//! 2. 题池选题 → 命中：返回并安排后台补货
//! 3. 未命中 → 同步生成并落库
//! 4. 生成失败 → 口语类返回降级题，其余返回 `Unavailable`

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clients::generator::ContentGenerator;
use crate::config::Config;
use crate::error::ServeError;
use crate::infrastructure::store::ItemStore;
use crate::models::category::Category;
use crate::models::item::{Item, ItemId};
use crate::services::{BackfillScheduler, GenerationFallback, PoolSelector, ProgressLog, QuotaGate};
use crate::utils::clock::Clock;
use crate::workflow::item_ctx::ItemCtx;

/// 题目来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    /// 题池命中
    Pool,
    /// 未命中，现场生成
    Generated,
    /// 生成失败后的降级题（未入库）
    Fallback,
}

/// 交付给用户的题目
#[derive(Debug, Clone)]
pub struct Delivered {
    pub item: Item,
    pub source: ItemSource,
}

/// 预加载结果
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadOutcome {
    /// 题池中已有可用题目
    Buffered(ItemId),
    /// 新生成了一道
    Generated(ItemId),
    /// 生成失败
    Failed,
}

/// 单题出题流程
///
/// - 编排闸门、选题、生成、补货的先后顺序
/// - 不直接访问存储，只依赖业务能力（services）
pub struct ItemFlow {
    quota: QuotaGate,
    selector: PoolSelector,
    generation: Arc<GenerationFallback>,
    backfill: BackfillScheduler,
    progress: ProgressLog,
}

impl ItemFlow {
    /// 创建新的出题流程
    pub fn new(
        store: Arc<dyn ItemStore>,
        generator: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let generation = Arc::new(GenerationFallback::new(
            store.clone(),
            generator,
            clock.clone(),
        ));

        Self {
            quota: QuotaGate::new(store.clone(), clock.clone(), config.quota.clone()),
            selector: PoolSelector::new(store.clone(), clock.clone(), &config.pool),
            backfill: BackfillScheduler::new(generation.clone(), &config.backfill),
            generation,
            progress: ProgressLog::new(store, clock),
        }
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    pub fn progress(&self) -> &ProgressLog {
        &self.progress
    }

    pub fn backfill(&self) -> &BackfillScheduler {
        &self.backfill
    }

    /// 为用户出一道题（扣额度）
    ///
    /// 命中和未命中都按类别扣一次额度。
    pub async fn serve(
        &self,
        ctx: &ItemCtx,
        exclude: &HashSet<ItemId>,
    ) -> Result<Delivered, ServeError> {
        // ========== 步骤 1: 额度闸门 ==========
        if let Err(e) = self.quota.admit(&ctx.user_id, ctx.category.name()).await {
            info!("{} 额度不足，拒绝出题", ctx);
            return Err(e);
        }

        // ========== 步骤 2-4: 选题 / 生成 / 降级 ==========
        self.fetch_part(ctx, exclude).await
    }

    /// 选题或生成，不扣额度（组卷时各部分共用一次扣费）
    pub async fn fetch_part(
        &self,
        ctx: &ItemCtx,
        exclude: &HashSet<ItemId>,
    ) -> Result<Delivered, ServeError> {
        // ========== 题池命中 ==========
        if let Some(item) = self
            .selector
            .select_for(&ctx.user_id, &ctx.level, ctx.category, exclude)
            .await
        {
            info!("{} ✓ 题池命中: {}", ctx, item.id);
            self.backfill.schedule(&ctx.level, ctx.category);
            return Ok(Delivered {
                item,
                source: ItemSource::Pool,
            });
        }

        // ========== 未命中，同步生成 ==========
        info!("{} 题池未命中，现场生成", ctx);
        match self
            .generation
            .generate(&ctx.level, ctx.category, &ctx.hints)
            .await
        {
            Ok(item) => Ok(Delivered {
                item,
                source: ItemSource::Generated,
            }),
            Err(e) => match self.generation.fallback_item(&ctx.level, ctx.category) {
                Some(item) => {
                    warn!("{} ⚠️ 生成失败，返回降级题: {}", ctx, e);
                    Ok(Delivered {
                        item,
                        source: ItemSource::Fallback,
                    })
                }
                None => {
                    error!("{} ❌ 生成失败，暂无可用题目: {}", ctx, e);
                    Err(ServeError::Unavailable {
                        category: ctx.category,
                        source: e,
                    })
                }
            },
        }
    }

    /// 预加载：题池里没有可用题时提前生成一道（不扣额度）
    pub async fn preload(
        &self,
        level: &str,
        category: Category,
        exclude: &HashSet<ItemId>,
    ) -> PreloadOutcome {
        if let Some(item) = self.selector.select(level, category, exclude).await {
            return PreloadOutcome::Buffered(item.id);
        }

        match self.generation.generate(level, category, &[]).await {
            Ok(item) => PreloadOutcome::Generated(item.id),
            Err(e) => {
                warn!("[预加载] ⚠️ ({}, {}) 生成失败: {}", level, category, e);
                PreloadOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::scripted::ScriptedGenerator;
    use crate::infrastructure::InMemoryStore;
    use crate::utils::clock::FixedClock;

    fn flow(generator: ScriptedGenerator) -> (ItemFlow, Arc<InMemoryStore>, Arc<ScriptedGenerator>) {
        let clock = Arc::new(FixedClock::morning());
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let generator = Arc::new(generator);
        let flow = ItemFlow::new(store.clone(), generator.clone(), clock, &Config::default());
        (flow, store, generator)
    }

    #[tokio::test]
    async fn test_miss_generates_then_hit_schedules_backfill() {
        let (flow, store, generator) = flow(ScriptedGenerator::new());
        let ctx = ItemCtx::new("u1", "C1", Category::Listening3);

        let first = flow.serve(&ctx, &HashSet::new()).await.unwrap();
        assert_eq!(first.source, ItemSource::Generated);
        assert_eq!(store.item_count().await, 1);

        let second = flow.serve(&ctx, &HashSet::new()).await.unwrap();
        assert_eq!(second.source, ItemSource::Pool);
        assert_eq!(second.item.id, first.item.id);

        flow.backfill().wait_idle().await;
        assert_eq!(generator.calls(), 2);
        assert_eq!(store.item_count().await, 2);
    }

    #[tokio::test]
    async fn test_quota_checked_before_selection() {
        let (flow, _store, generator) = flow(ScriptedGenerator::new());
        let ctx = ItemCtx::new("u1", "C1", Category::Writing2);

        for _ in 0..3 {
            flow.serve(&ctx, &HashSet::new()).await.unwrap();
        }
        flow.backfill().wait_idle().await;
        let calls = generator.calls();

        let err = flow.serve(&ctx, &HashSet::new()).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(generator.calls(), calls);
    }

    #[tokio::test]
    async fn test_text_category_failure_is_unavailable() {
        let (flow, _store, _) =
            flow(ScriptedGenerator::new().failing_on(Category::ReadingAndUseOfLanguage6));
        let ctx = ItemCtx::new("u1", "C1", Category::ReadingAndUseOfLanguage6);

        let err = flow.serve(&ctx, &HashSet::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Unavailable {
                category: Category::ReadingAndUseOfLanguage6,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_speaking_failure_degrades_to_canned_item() {
        let (flow, store, _) = flow(ScriptedGenerator::new().failing_on(Category::Speaking2));
        let ctx = ItemCtx::new("u1", "C1", Category::Speaking2);

        let delivered = flow.serve(&ctx, &HashSet::new()).await.unwrap();
        assert_eq!(delivered.source, ItemSource::Fallback);
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_preload_buffers_once() {
        let (flow, _store, generator) = flow(ScriptedGenerator::new());

        let first = flow.preload("C2", Category::Speaking1, &HashSet::new()).await;
        assert!(matches!(first, PreloadOutcome::Generated(_)));

        let second = flow.preload("C2", Category::Speaking1, &HashSet::new()).await;
        assert!(matches!(second, PreloadOutcome::Buffered(_)));
        assert_eq!(generator.calls(), 1);

        generator.set_failing(Category::Speaking3, true);
        assert_eq!(
            flow.preload("C2", Category::Speaking3, &HashSet::new()).await,
            PreloadOutcome::Failed
        );
    }
}

//! 生成兜底 - 业务能力层
//!
//! 题池未命中时同步调用生成器，先落库再返回，生成的题目随即进入公共题池。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clients::generator::ContentGenerator;
use crate::error::GenerationError;
use crate::infrastructure::store::ItemStore;
use crate::models::category::Category;
use crate::models::item::{Item, ItemId, ItemPayload, NewItem, SpeakingTask};
use crate::utils::clock::Clock;

/// 生成兜底
pub struct GenerationFallback {
    store: Arc<dyn ItemStore>,
    generator: Arc<dyn ContentGenerator>,
    clock: Arc<dyn Clock>,
}

impl GenerationFallback {
    pub fn new(
        store: Arc<dyn ItemStore>,
        generator: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
        }
    }

    /// 生成一道题并落库
    ///
    /// 生成内容的题型家族与类别不符时返回 `SchemaMismatch`，不会落库。
    pub async fn generate(
        &self,
        level: &str,
        category: Category,
        hints: &[String],
    ) -> Result<Item, GenerationError> {
        info!("[生成] 🤖 开始生成 ({}, {})", level, category);

        let payload = self
            .generator
            .generate(category, level, hints)
            .await
            .map_err(|e| {
                error!("[生成] ❌ 生成失败 ({}, {}): {}", level, category, e);
                e
            })?;

        if payload.family() != category.family() {
            warn!(
                "[生成] ⚠️ 内容类别不符 ({}): 期望 {}, 实际 {}",
                category,
                category.family(),
                payload.family()
            );
            return Err(GenerationError::SchemaMismatch {
                expected: category.family().to_string(),
                actual: payload.family().to_string(),
            });
        }

        let item = self
            .store
            .put_item(NewItem {
                level: level.to_string(),
                category,
                payload,
                public: true,
            })
            .await?;

        info!(
            "[生成] ✓ 已生成并入库 ({}, {}): {} '{}'",
            level,
            category,
            item.id,
            item.payload.title()
        );
        Ok(item)
    }

    /// 降级内容（不落库）
    ///
    /// 只有口语类题目有固定的降级题；其余类别返回 `None`。
    pub fn fallback_item(&self, level: &str, category: Category) -> Option<Item> {
        if !category.has_degraded_fallback() {
            return None;
        }

        let task = match category {
            c if c.is_image_bearing() => SpeakingTask {
                title: "Long Turn: Moments of Celebration".to_string(),
                instructions: "Compare two of the pictures and say why people might be \
                               celebrating and how memorable the moment might be."
                    .to_string(),
                prompts: vec![
                    "Why might these people be celebrating?".to_string(),
                    "Which celebration do you think is the most memorable?".to_string(),
                ],
                image_urls: vec![
                    "A family gathered around a birthday cake".to_string(),
                    "A team lifting a trophy in a stadium".to_string(),
                    "Graduates throwing their caps in the air".to_string(),
                ],
            },
            Category::Speaking3 => SpeakingTask {
                title: "Collaborative Task: Technology and Daily Life".to_string(),
                instructions: "Talk together about how technology has affected these areas \
                               of life, then decide which has changed the most."
                    .to_string(),
                prompts: vec![
                    "Communication".to_string(),
                    "Work".to_string(),
                    "Education".to_string(),
                    "Health".to_string(),
                    "Leisure".to_string(),
                ],
                image_urls: Vec::new(),
            },
            _ => SpeakingTask {
                title: "Interview".to_string(),
                instructions: "Answer the examiner's questions.".to_string(),
                prompts: vec![
                    "Where are you from?".to_string(),
                    "What do you enjoy most about your work or studies?".to_string(),
                    "How do you think your town will change in the future?".to_string(),
                ],
                image_urls: Vec::new(),
            },
        };

        Some(Item {
            id: ItemId::new(format!("fallback-{}", category.name())),
            level: level.to_string(),
            category,
            payload: ItemPayload::Speaking(task),
            flagged: false,
            public: false,
            created_at: self.clock.now(),
            version: 0,
        })
    }
}

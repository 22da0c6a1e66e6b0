//! 内容生成器接口
//!
//! 外部生成器（通常是 LLM）延迟高且不稳定，调用方只看到这个 trait。

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::models::category::Category;
use crate::models::item::ItemPayload;

/// 内容生成器
///
/// 必须可以被并发调用，且不持有跨调用的状态。
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// 按类别和级别生成一道题
    ///
    /// `hints` 用于引导生成内容（如用户的薄弱点、话题）。
    async fn generate(
        &self,
        category: Category,
        level: &str,
        hints: &[String],
    ) -> Result<ItemPayload, GenerationError>;
}

//! 出题上下文
//!
//! 封装"为谁、在哪个级别、出哪类题"这一信息

use std::fmt::Display;

use crate::models::category::Category;

/// 出题上下文
///
/// 包含处理单次出题请求所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 用户ID
    pub user_id: String,

    /// 级别（如 C1、C2）
    pub level: String,

    /// 题目类别
    pub category: Category,

    /// 生成提示（用户薄弱点等），只在需要生成时使用
    pub hints: Vec<String>,
}

impl ItemCtx {
    /// 创建新的出题上下文
    pub fn new(user_id: impl Into<String>, level: impl Into<String>, category: Category) -> Self {
        Self {
            user_id: user_id.into(),
            level: level.into(),
            category,
            hints: Vec::new(),
        }
    }

    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.hints = hints;
        self
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[用户 {} 级别 {} 类别 {}]",
            self.user_id, self.level, self.category
        )
    }
}

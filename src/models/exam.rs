use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::category::Category;
use crate::models::item::Item;

/// 一次组卷结果（不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAssembly {
    pub id: Uuid,
    pub level: String,
    pub title: String,
    pub duration_minutes: u32,
    /// 按固定类别顺序排列的各部分
    pub ordered_parts: Vec<Item>,
    /// 失败或超时而被省略的类别
    pub missing: Vec<Category>,
}

impl ExamAssembly {
    pub fn new(level: impl Into<String>, duration_minutes: u32) -> Self {
        let level = level.into();
        Self {
            id: Uuid::new_v4(),
            title: format!("Cambridge {} Mock Exam", level),
            level,
            duration_minutes,
            ordered_parts: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// 各部分的类别（按输出顺序）
    pub fn categories(&self) -> Vec<Category> {
        self.ordered_parts.iter().map(|item| item.category).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

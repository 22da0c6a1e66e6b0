//! 脚本化生成器
//!
//! 不调用任何外部服务，按预设返回题目或错误。用于测试和离线演练。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::generator::ContentGenerator;
use crate::error::GenerationError;
use crate::models::category::{Category, CategoryFamily};
use crate::models::item::{
    ExerciseBody, ItemPayload, ListeningBody, SpeakingTask, WritingTask,
};

/// 脚本化生成器
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    failing: Mutex<HashSet<Category>>,
    delays: HashMap<Category, Duration>,
    calls: AtomicUsize,
    calls_by_category: Mutex<HashMap<Category, usize>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定类别总是生成失败
    pub fn failing_on(self, category: Category) -> Self {
        self.set_failing(category, true);
        self
    }

    /// 指定类别的生成延迟
    pub fn with_delay(mut self, category: Category, delay: Duration) -> Self {
        self.delays.insert(category, delay);
        self
    }

    pub fn set_failing(&self, category: Category, failing: bool) {
        let mut guard = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing {
            guard.insert(category);
        } else {
            guard.remove(&category);
        }
    }

    /// 总调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 某个类别的调用次数
    pub fn calls_for(&self, category: Category) -> usize {
        self.calls_by_category
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&category)
            .copied()
            .unwrap_or(0)
    }

    fn record_call(&self, category: Category) -> usize {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .calls_by_category
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(category)
            .or_insert(0) += 1;
        n
    }

    fn is_failing(&self, category: Category) -> bool {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&category)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        category: Category,
        level: &str,
        hints: &[String],
    ) -> Result<ItemPayload, GenerationError> {
        let n = self.record_call(category);

        if let Some(delay) = self.delays.get(&category) {
            tokio::time::sleep(*delay).await;
        }

        if self.is_failing(category) {
            return Err(GenerationError::api("scripted", format!("{} 被设置为失败", category)));
        }

        Ok(sample_payload(category, level, hints, n))
    }
}

/// 生成一份占位题目
pub fn sample_payload(category: Category, level: &str, hints: &[String], n: usize) -> ItemPayload {
    let title = format!("{} ({}) #{}", category, level, n);
    match category.family() {
        CategoryFamily::Reading => ItemPayload::Reading(ExerciseBody {
            title,
            instructions: "Read the text and answer the questions.".to_string(),
            text: Some("Lorem ipsum [1] ________ dolor.".to_string()),
            questions: Vec::new(),
            hints: hints.to_vec(),
        }),
        CategoryFamily::Listening => ItemPayload::Listening(ListeningBody {
            title,
            instructions: "Listen and answer.".to_string(),
            transcript: "Speaker one: ...".to_string(),
            ..Default::default()
        }),
        CategoryFamily::Writing => ItemPayload::Writing(WritingTask {
            title,
            instructions: "Write 220-260 words.".to_string(),
            task_text: "Write an essay.".to_string(),
            notes: Vec::new(),
        }),
        CategoryFamily::Speaking => ItemPayload::Speaking(SpeakingTask {
            title,
            instructions: "Answer the questions.".to_string(),
            prompts: vec!["Tell me about your hometown.".to_string()],
            image_urls: Vec::new(),
        }),
    }
}

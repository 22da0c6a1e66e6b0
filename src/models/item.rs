use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::category::{Category, CategoryFamily};

/// 题目 ID（由存储分配）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 生成新的随机 ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 题目
///
/// 创建后除 `flagged` 外不可变；不会被物理删除，只会被标记下架。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub level: String,
    pub category: Category,
    pub payload: ItemPayload,
    /// 被举报下架（单向，置位后不再恢复）
    pub flagged: bool,
    /// 是否进入公共题池
    pub public: bool,
    pub created_at: DateTime<Utc>,
    /// 乐观锁版本号，每次更新 +1
    pub version: u64,
}

/// 待写入的题目（ID、时间戳、版本由存储分配）
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub level: String,
    pub category: Category,
    pub payload: ItemPayload,
    pub public: bool,
}

/// 题目的局部更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub flagged: Option<bool>,
}

impl ItemPatch {
    /// 下架补丁
    pub fn flag() -> Self {
        Self {
            flagged: Some(true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_none()
    }
}

/// 题目内容
///
/// 按题型家族区分结构。核心组件只关心 `family()`，不解析具体内容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Reading(ExerciseBody),
    Listening(ListeningBody),
    Writing(WritingTask),
    Speaking(SpeakingTask),
}

/// 阅读 / 语言运用题
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExerciseBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// 听力题
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListeningBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, alias = "text")]
    pub transcript: String,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}

/// 写作任务
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WritingTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default, alias = "text")]
    pub task_text: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// 口语任务
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeakingTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// 单个小题
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// 小题编号
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stem: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub answer_type: AnswerType,
    /// 句型转换题的关键词
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionSpec {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    MultipleChoice,
    #[default]
    ShortAnswer,
    Essay,
}

impl ItemPayload {
    /// 内容所属的题型家族
    pub fn family(&self) -> CategoryFamily {
        match self {
            ItemPayload::Reading(_) => CategoryFamily::Reading,
            ItemPayload::Listening(_) => CategoryFamily::Listening,
            ItemPayload::Writing(_) => CategoryFamily::Writing,
            ItemPayload::Speaking(_) => CategoryFamily::Speaking,
        }
    }

    /// 按类别把生成器返回的原始 JSON 解析为对应结构
    ///
    /// 生成器的输出不带 `kind` 字段，由请求的类别决定结构。
    pub fn from_json(category: Category, value: JsonValue) -> Result<Self, serde_json::Error> {
        let payload = match category.family() {
            CategoryFamily::Reading => ItemPayload::Reading(serde_json::from_value(value)?),
            CategoryFamily::Listening => ItemPayload::Listening(serde_json::from_value(value)?),
            CategoryFamily::Writing => ItemPayload::Writing(serde_json::from_value(value)?),
            CategoryFamily::Speaking => ItemPayload::Speaking(serde_json::from_value(value)?),
        };
        Ok(payload)
    }

    /// 标题（用于日志）
    pub fn title(&self) -> &str {
        match self {
            ItemPayload::Reading(body) => &body.title,
            ItemPayload::Listening(body) => &body.title,
            ItemPayload::Writing(task) => &task.title,
            ItemPayload::Speaking(task) => &task.title,
        }
    }
}

impl Item {
    /// 当前是否可被选中
    pub fn is_selectable(&self) -> bool {
        !self.flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_follows_category_family() {
        let raw = json!({
            "title": "Multiple Choice Cloze",
            "instructions": "For questions 1-8, choose the answer.",
            "text": "The [1] ________ of the city...",
            "questions": [
                {
                    "question": "1",
                    "options": [{"text": "striking"}, {"text": "big"}],
                    "answer": "striking",
                    "answer_type": "multiple_choice"
                }
            ]
        });

        let payload = ItemPayload::from_json(Category::ReadingAndUseOfLanguage1, raw).unwrap();
        assert_eq!(payload.family(), CategoryFamily::Reading);
        assert_eq!(payload.title(), "Multiple Choice Cloze");

        match payload {
            ItemPayload::Reading(body) => {
                assert_eq!(body.questions.len(), 1);
                assert_eq!(body.questions[0].answer_type, AnswerType::MultipleChoice);
            }
            other => panic!("意外的题型: {:?}", other),
        }
    }

    #[test]
    fn test_listening_accepts_text_as_transcript() {
        let payload =
            ItemPayload::from_json(Category::Listening2, json!({"text": "Speaker one..."}))
                .unwrap();
        match payload {
            ItemPayload::Listening(body) => assert_eq!(body.transcript, "Speaker one..."),
            other => panic!("意外的题型: {:?}", other),
        }
    }

    #[test]
    fn test_payload_is_tagged_by_kind() {
        let payload = ItemPayload::Speaking(SpeakingTask {
            title: "Long turn".to_string(),
            ..Default::default()
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "speaking");

        let back: ItemPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }
}

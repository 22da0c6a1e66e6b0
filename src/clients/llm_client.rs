//! LLM 生成客户端
//!
//! 通过 OpenAI 兼容接口生成题目，实现 `ContentGenerator`。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（Azure、Gemini 等兼容服务）

use std::sync::OnceLock;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::clients::generator::ContentGenerator;
use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::models::category::{Category, CategoryFamily};
use crate::models::item::ItemPayload;
use crate::utils::logging::truncate_text;

const SYSTEM_PROMPT: &str = "You are a strict Cambridge Assessment English examiner writing \
C1 Advanced and C2 Proficiency material. Texts must read like high-quality journalism. \
Correct answers must paraphrase the text; distractors must be plausible. \
Never put option letters inside option text. Reply with a single JSON object only.";

/// LLM 客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送聊天请求，返回去掉首尾空白的文本
    async fn chat(&self, user_message: &str, system_message: &str) -> Result<String, GenerationError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let api_error = |e: async_openai::error::OpenAIError| GenerationError::api(&self.model_name, e);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(api_error)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(api_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(api_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            GenerationError::api(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| GenerationError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ContentGenerator for LlmClient {
    async fn generate(
        &self,
        category: Category,
        level: &str,
        hints: &[String],
    ) -> Result<ItemPayload, GenerationError> {
        let prompt = build_prompt(category, level, hints);
        let response = self.chat(&prompt, SYSTEM_PROMPT).await?;

        if response.is_empty() {
            return Err(GenerationError::EmptyResponse {
                model: self.model_name.clone(),
            });
        }

        parse_payload(category, &response)
    }
}

/// 构建生成提示词
fn build_prompt(category: Category, level: &str, hints: &[String]) -> String {
    let hint_block = if hints.is_empty() {
        String::new()
    } else {
        format!(
            "\nFocus on these areas where possible:\n{}\n",
            hints
                .iter()
                .map(|h| format!("- {}", h))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"Generate ONE "{category}" exercise for level {level}.
{instructions}
{hints}
Output JSON structure:
{shape}"#,
        category = category.name(),
        level = level,
        instructions = type_instructions(category),
        hints = hint_block,
        shape = output_shape(category.family()),
    )
}

fn type_instructions(category: Category) -> &'static str {
    match category {
        Category::ReadingAndUseOfLanguage1 => {
            "Part 1 Multiple Choice Cloze: 180-220 words, 8 gaps marked [1] ________ to [8] ________, \
             4 options each; the answer is the exact option text."
        }
        Category::ReadingAndUseOfLanguage2 => {
            "Part 2 Open Cloze: 180-220 words, gaps [9] to [16], one grammar word each; options must be []."
        }
        Category::ReadingAndUseOfLanguage3 => {
            "Part 3 Word Formation: 180-200 words, gaps [17] to [24]; the keyword is the stem word in capitals."
        }
        Category::ReadingAndUseOfLanguage4 => {
            "Part 4 Key Word Transformation: 6 items with the first sentence as stem, keyword, and a 3-6 word answer."
        }
        Category::ReadingAndUseOfLanguage5 => {
            "Part 5 Multiple Choice: one long text of about 700 words and 6 four-option questions."
        }
        Category::ReadingAndUseOfLanguage6 => {
            "Part 6 Cross-Text Matching: four short texts A-D by different writers and 4 opinion questions."
        }
        Category::ReadingAndUseOfLanguage7 => {
            "Part 7 Gapped Text: a text with 6 removed paragraphs plus one extra distractor paragraph."
        }
        Category::ReadingAndUseOfLanguage8 => {
            "Part 8 Multiple Matching: 4-5 sections and 10 questions matched to sections."
        }
        Category::Listening1 => "Listening Part 1: three short extracts, two multiple choice questions each.",
        Category::Listening2 => "Listening Part 2: a monologue with 8 sentence-completion gaps.",
        Category::Listening3 => "Listening Part 3: an interview with 6 multiple choice questions.",
        Category::Listening4 => "Listening Part 4: five short monologues with two matching tasks.",
        Category::Writing1 => "Writing Part 1: an essay task with input text and three notes.",
        Category::Writing2 => "Writing Part 2: a proposal, report or review task.",
        Category::Speaking1 => "Speaking Part 1: interview questions on everyday and abstract topics.",
        Category::Speaking2 => {
            "Speaking Part 2: a long turn comparing pictures; give picture descriptions as image_urls."
        }
        Category::Speaking3 => "Speaking Part 3: a collaborative task with a central question and five prompts.",
    }
}

fn output_shape(family: CategoryFamily) -> &'static str {
    match family {
        CategoryFamily::Reading => {
            r#"{"title": "...", "instructions": "...", "text": "...", "questions": [{"question": "1", "stem": "...", "options": [{"text": "..."}], "answer": "...", "answer_type": "multiple_choice"}]}"#
        }
        CategoryFamily::Listening => {
            r#"{"title": "...", "instructions": "...", "transcript": "...", "questions": [{"question": "1", "stem": "...", "options": [{"text": "..."}], "answer": "...", "answer_type": "multiple_choice"}]}"#
        }
        CategoryFamily::Writing => {
            r#"{"title": "...", "instructions": "...", "task_text": "...", "notes": ["..."]}"#
        }
        CategoryFamily::Speaking => {
            r#"{"title": "...", "instructions": "...", "prompts": ["..."], "image_urls": []}"#
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("代码块正则无效")
    })
}

/// 去掉模型有时会加上的 markdown 代码块
fn strip_code_fence(response: &str) -> &str {
    fence_regex()
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(response)
        .trim()
}

/// 把模型输出解析为题目内容
fn parse_payload(category: Category, response: &str) -> Result<ItemPayload, GenerationError> {
    let body = strip_code_fence(response);
    let value: JsonValue = serde_json::from_str(body).map_err(|e| {
        warn!(
            "无法解析 LLM 响应 ({}): '{}'",
            category,
            truncate_text(body, 80)
        );
        GenerationError::invalid_payload(category, e)
    })?;

    if !value.is_object() {
        return Err(GenerationError::invalid_payload(
            category,
            "响应不是 JSON 对象",
        ));
    }

    ItemPayload::from_json(category, value).map_err(|e| GenerationError::invalid_payload(category, e))
}

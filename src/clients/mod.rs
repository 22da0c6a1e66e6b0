pub mod generator;
pub mod llm_client;
pub mod scripted;

pub use generator::ContentGenerator;
pub use llm_client::LlmClient;
pub use scripted::ScriptedGenerator;

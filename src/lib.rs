//! # Exercise Pool
//!
//! 练习题题池缓存：按 (级别, 类别) 缓存预生成的题目，按每日额度发放，
//! 未命中时现场生成，命中后后台补货，举报达到阈值的题目自动下架，
//! 并能并发拼出一整套模拟考试。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有持久化资源，只暴露读写能力
//! - `ItemStore` - 存储接口（扫描、点读写、原子计数器）
//! - `InMemoryStore` - 进程内实现
//!
//! 外部生成器位于 `clients/`：`ContentGenerator` 接口与 `LlmClient` 实现。
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务一种能力
//! - `QuotaGate` - 每日额度、会员、批改点数、广告奖励
//! - `PoolSelector` - 随机选题
//! - `GenerationFallback` - 未命中时生成并落库
//! - `BackfillScheduler` - 命中后后台补货
//! - `ReportAggregator` - 举报汇总与下架
//! - `ProgressLog` - 答题记录与已完成集合
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"出一道题"的完整流程
//! - `ItemCtx` - 上下文封装（用户 + 级别 + 类别）
//! - `ItemFlow` - 流程编排（闸门 → 选题 → 生成 → 降级）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/exam_assembler` - 并发组卷
//! - `orchestrator/replenisher` - 批量补货程序
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ContentGenerator, LlmClient, ScriptedGenerator};
pub use config::Config;
pub use error::{AppError, AppResult, GenerationError, ServeError, StoreError};
pub use infrastructure::{InMemoryStore, ItemStore};
pub use models::{Category, ExamAssembly, Item, ItemId, ItemPayload, QuotaSnapshot, ReportOutcome};
pub use orchestrator::{App, ExamAssembler};
pub use services::{QuotaGate, ReportAggregator};
pub use workflow::{Delivered, ItemCtx, ItemFlow, ItemSource, PreloadOutcome};

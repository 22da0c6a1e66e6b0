//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责多任务的并发调度和汇总，不做单题层面的业务判断。
//!
//! ## 模块划分
//!
//! ### `exam_assembler` - 模拟考试组卷
//! - 整套试卷扣一次额度
//! - 每个部分一个任务（Semaphore 限流 + 单部分超时）
//! - 按固定部分顺序汇总，失败的部分省略
//!
//! ### `replenisher` - 题池批量补货
//! - 管理补货程序的生命周期（初始化、运行）
//! - 盘点每个题池的缺口
//! - 分批并发生成，输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! exam_assembler (处理一整套试卷)      replenisher (处理所有题池)
//!     ↓                                    ↓
//! workflow::ItemFlow (处理单个部分)    services::GenerationFallback
//!     ↓
//! services (能力层：额度 / 选题 / 生成 / 补货)
//!     ↓
//! infrastructure (基础设施：ItemStore)
//! ```

pub mod exam_assembler;
pub mod replenisher;

// 重新导出主要类型
pub use exam_assembler::ExamAssembler;
pub use replenisher::{App, PoolReplenisher, ReplenishStats};

//! 业务能力层（Services）
//!
//! 每个服务只负责一种能力，通过构造参数拿到存储、生成器和时钟。

pub mod backfill;
pub mod generation;
pub mod pool_selector;
pub mod progress;
pub mod quota_gate;
pub mod report_aggregator;

pub use backfill::BackfillScheduler;
pub use generation::GenerationFallback;
pub use pool_selector::PoolSelector;
pub use progress::ProgressLog;
pub use quota_gate::QuotaGate;
pub use report_aggregator::ReportAggregator;

pub mod category;
pub mod exam;
pub mod item;
pub mod progress;
pub mod quota;
pub mod report;

pub use category::{Category, CategoryFamily, ParseCategoryError};
pub use exam::ExamAssembly;
pub use item::{Item, ItemId, ItemPatch, ItemPayload, NewItem};
pub use progress::ResultRecord;
pub use quota::{BoundedIncrement, QuotaSnapshot, UserQuotaState};
pub use report::{Report, ReportOutcome};

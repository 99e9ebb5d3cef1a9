pub mod section_ctx;
pub mod task_ledger;

pub use section_ctx::SectionCtx;
pub use task_ledger::TaskLedger;

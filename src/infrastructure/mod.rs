//! 基础设施层：持有唯一的共享资源（台账文件），只暴露读写能力

pub mod ledger_store;

pub use ledger_store::{JsonFileStore, LedgerState, LedgerStore, MemoryStore};

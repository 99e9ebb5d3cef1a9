//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 命令处理器
//! - 管理应用生命周期（书籍目录、台账、生成器）
//! - 实现 research / write / review / proofread / status / resume / progress / agent 命令
//!
//! ### `dispatcher` - 并行调度器
//! - 创建批量任务并派发给各 Agent
//! - 控制并发数量（Semaphore）
//! - 按完成顺序汇总结果
//!
//! ### `section_processor` - 单个小节处理器
//! - running → Agent（带超时）→ completed / failed
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理命令)
//!     ↓
//! dispatcher (处理 Vec<节号>)
//!     ↓
//! section_processor (处理单个小节任务)
//!     ↓
//! workflow::TaskLedger + services::SectionAgent
//!     ↓
//! infrastructure (基础设施：LedgerStore)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：dispatcher 管并发，section_processor 管单个任务的状态流转
//! 2. **资源隔离**：只有编排层持有台账和生成器
//! 3. **向下依赖**：编排层 → workflow / services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不读写小节内容

pub mod batch_processor;
pub mod dispatcher;
pub mod section_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use dispatcher::{BatchReport, Dispatcher};
pub use section_processor::{process_section, SectionOutcome};

//! # Book Batch
//!
//! 书籍写作流程的多 Agent 批量处理工具
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有唯一的共享资源（台账文件），只暴露读写能力
//! - `LedgerStore` - 台账存储接口；`JsonFileStore` / `MemoryStore`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个小节
//! - `SectionRepository` - 定位小节文件、读写 front matter
//! - `ContentGenerator` - 内容生成接口（自带 `StubGenerator`）
//! - `ResearchAgent` / `WritingAgent` / `ReviewAgent` / `EditorAgent` - 四个环节
//! - `progress` - 全书进度统计
//! - `validation` / `proofread` - 内容验证与校对检查（不依赖生成器）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义任务的生命周期
//! - `TaskLedger` - 状态机 + 持久化
//! - `SectionCtx` - 上下文封装（节号 + 环节 + Agent 编号）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 并行调度器，管理并发
//! - `orchestrator/section_processor` - 单个小节处理器
//! - `orchestrator/batch_processor` - 命令入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{JsonFileStore, LedgerStore, MemoryStore};
pub use models::{expand_section_ids, Operation, Task, TaskStatus};
pub use orchestrator::{App, BatchReport, Dispatcher};
pub use workflow::{SectionCtx, TaskLedger};

//! 小节任务上下文
//!
//! 封装"我正在用哪个 Agent 处理哪一节的哪个环节"这一信息

use std::fmt::Display;

use crate::models::Operation;

/// 小节任务上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCtx {
    /// 节号
    pub section_id: String,

    /// 环节
    pub operation: Operation,

    /// 执行该任务的 Agent 编号（从1开始）
    pub agent_id: u32,

    /// 在本批中的序号（从1开始，仅用于日志显示）
    pub index: usize,
}

impl SectionCtx {
    pub fn new(section_id: String, operation: Operation, agent_id: u32, index: usize) -> Self {
        Self {
            section_id,
            operation,
            agent_id,
            index,
        }
    }
}

impl Display for SectionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}-{} 小节#{} {}]",
            self.operation.agent_type(),
            self.agent_id,
            self.section_id,
            self.operation
        )
    }
}

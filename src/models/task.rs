use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 写作流水线中的一个环节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// 研究
    Research,
    /// 撰写
    Write,
    /// 审查
    Review,
    /// 校对
    Proofread,
}

impl Operation {
    /// 恢复任务时的处理顺序
    pub const ALL: [Operation; 4] = [
        Operation::Research,
        Operation::Write,
        Operation::Review,
        Operation::Proofread,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Research => "research",
            Operation::Write => "write",
            Operation::Review => "review",
            Operation::Proofread => "proofread",
        }
    }

    /// 负责该环节的 Agent 类型名
    pub fn agent_type(self) -> &'static str {
        match self {
            Operation::Research => "ResearchAgent",
            Operation::Write => "WritingAgent",
            Operation::Review => "ReviewAgent",
            Operation::Proofread => "EditorAgent",
        }
    }

    /// 中文动作名（用于日志）
    pub fn label(self) -> &'static str {
        match self {
            Operation::Research => "研究",
            Operation::Write => "撰写",
            Operation::Review => "审查",
            Operation::Proofread => "校对",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(Operation::Research),
            "write" => Ok(Operation::Write),
            "review" => Ok(Operation::Review),
            "proofread" => Ok(Operation::Proofread),
            other => Err(format!("未知操作: {}", other)),
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// 状态机：pending → running → {completed | failed}，failed 只能经恢复重新进入 running
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Failed, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    /// 是否可以被 resume 重新提交
    pub fn is_resumable(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个小节在某个环节上的工作单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub section_id: String,
    pub operation: Operation,
    pub status: TaskStatus,
    /// 创建时分配的 Agent 编号（从 1 开始）
    pub agent_id: u32,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub error_msg: Option<String>,
    /// Agent 输出摘要
    #[serde(default)]
    pub output: Option<String>,
}

impl Task {
    pub fn pending(section_id: impl Into<String>, operation: Operation, agent_id: u32) -> Self {
        Self {
            section_id: section_id.into(),
            operation,
            status: TaskStatus::Pending,
            agent_id,
            started_at: None,
            completed_at: None,
            error_msg: None,
            output: None,
        }
    }

    pub fn matches(&self, section_id: &str, operation: Operation) -> bool {
        self.operation == operation && self.section_id == section_id
    }
}

/// 各状态的任务数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            counts.total += 1;
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

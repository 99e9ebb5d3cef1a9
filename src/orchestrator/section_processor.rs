//! 单个小节处理器 - 编排层
//!
//! ## 职责
//!
//! 负责一个 (节号, 环节) 任务的完整生命周期：
//!
//! 1. **标记开始**：台账 pending/failed → running
//! 2. **调用 Agent**：在超时限制内执行 `SectionAgent::process`
//! 3. **记录结果**：running → completed（附输出摘要）或 failed（附错误信息）
//!
//! 任何错误都只影响当前任务，不会向上传播。

use crate::error::AgentError;
use crate::services::SectionAgent;
use crate::workflow::{SectionCtx, TaskLedger};
use std::time::Duration;
use tracing::{debug, error, info};

/// 单个任务的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutcome {
    pub section_id: String,
    /// 成功时为输出摘要，失败时为错误信息
    pub result: Result<String, String>,
}

impl SectionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    fn failed(ctx: &SectionCtx, message: String) -> Self {
        Self {
            section_id: ctx.section_id.clone(),
            result: Err(message),
        }
    }
}

/// 处理单个小节任务
///
/// # 参数
/// - `ledger`: 任务台账
/// - `agent`: 负责该任务的 Agent
/// - `ctx`: 任务上下文
/// - `task_timeout`: 单个任务的最长执行时间
pub async fn process_section(
    ledger: &TaskLedger,
    agent: &dyn SectionAgent,
    ctx: &SectionCtx,
    task_timeout: Duration,
) -> SectionOutcome {
    debug!("{} 开始处理 (第 {} 项)", ctx, ctx.index);

    // 1. 标记为进行中
    if let Err(e) = ledger.mark_running(&ctx.section_id, ctx.operation).await {
        error!("{} ❌ 无法开始任务: {}", ctx, e);
        // 遗留的 running 任务在这里转为 failed，之后可以 resume
        if let Err(record_err) = ledger
            .mark_failed(&ctx.section_id, ctx.operation, &e.to_string())
            .await
        {
            debug!("{} 记录失败状态时出错: {}", ctx, record_err);
        }
        return SectionOutcome::failed(ctx, e.to_string());
    }

    // 2. 执行 Agent
    let result = match tokio::time::timeout(task_timeout, agent.process(&ctx.section_id)).await {
        Ok(Ok(output)) => Ok(output.summary),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(AgentError::Timeout {
            section_id: ctx.section_id.clone(),
            timeout: task_timeout,
        }
        .to_string()),
    };

    // 3. 记录结果
    let recorded = match &result {
        Ok(summary) => {
            ledger
                .mark_completed(&ctx.section_id, ctx.operation, summary)
                .await
        }
        Err(message) => {
            ledger
                .mark_failed(&ctx.section_id, ctx.operation, message)
                .await
        }
    };

    let result = match recorded {
        Ok(_) => result,
        Err(e) => {
            error!("{} ⚠️ 更新台账失败: {}", ctx, e);
            Err(e.to_string())
        }
    };

    match &result {
        Ok(summary) => info!("  ✅ [{}] {} 完成: {}", agent.name(), ctx.section_id, summary),
        Err(message) => error!("  ❌ [{}] {} 失败: {}", agent.name(), ctx.section_id, message),
    }

    SectionOutcome {
        section_id: ctx.section_id.clone(),
        result,
    }
}

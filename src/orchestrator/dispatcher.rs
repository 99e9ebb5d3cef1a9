//! 并行调度器 - 编排层
//!
//! ## 职责
//!
//! 把一组节号分发给有限数量的 Agent 并行处理，汇总成功/失败。
//!
//! - **并发控制**：Semaphore 限制同时运行的任务数
//! - **分配方式**：每个任务交给台账为它分配的 Agent 编号
//! - **结果收集**：按完成顺序收集（FuturesUnordered）
//! - **失败隔离**：单个任务失败或 panic 不影响其他任务，也不自动重试

use crate::config::clamp_workers;
use crate::error::{AgentError, AppError, AppResult};
use crate::models::Operation;
use crate::orchestrator::section_processor::{self, SectionOutcome};
use crate::services::{agent_for, AgentContext, SectionAgent};
use crate::utils::logging;
use crate::workflow::{SectionCtx, TaskLedger};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// 一次批量运行的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub operation: Operation,
    pub total: usize,
    /// 成功的节号（按完成顺序）
    pub succeeded: Vec<String>,
    /// 失败的节号（按完成顺序）
    pub failed: Vec<String>,
    pub elapsed: Duration,
}

impl BatchReport {
    fn empty(operation: Operation) -> Self {
        Self {
            operation,
            total: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 并行调度器
pub struct Dispatcher {
    ledger: Arc<TaskLedger>,
    agent_ctx: AgentContext,
    workers: usize,
    task_timeout: Duration,
    log_file: Option<String>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<TaskLedger>,
        agent_ctx: AgentContext,
        workers: usize,
        task_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            agent_ctx,
            workers: clamp_workers(workers),
            task_timeout,
            log_file: None,
        }
    }

    /// 每个任务的结果同时追加到运行日志文件
    pub fn with_log_file(mut self, log_file: Option<String>) -> Self {
        self.log_file = log_file;
        self
    }

    /// 创建批量任务并并行执行
    pub async fn run_parallel(
        &self,
        section_ids: &[String],
        operation: Operation,
    ) -> AppResult<BatchReport> {
        self.ledger.create_batch(section_ids, operation).await?;
        self.dispatch(section_ids, operation).await
    }

    /// 并行执行台账中已有的任务（不新建任务，用于 resume）
    pub async fn dispatch(
        &self,
        section_ids: &[String],
        operation: Operation,
    ) -> AppResult<BatchReport> {
        // 同一批内重复的节号只对应一个任务
        let mut seen = HashSet::new();
        let section_ids: Vec<&String> = section_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .collect();

        if section_ids.is_empty() {
            warn!("⚠️ 没有需要处理的小节");
            return Ok(BatchReport::empty(operation));
        }

        let total = section_ids.len();
        logging::log_batch_start(operation, total, self.workers);
        let start = Instant::now();

        // 每个 Agent 编号一个实例
        let agents: Vec<Arc<dyn SectionAgent>> = (1..=self.workers)
            .map(|id| agent_for(operation, id as u32, self.agent_ctx.clone()))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut running = FuturesUnordered::new();

        for (index, section_id) in section_ids.into_iter().enumerate() {
            let agent_id = self.agent_slot(section_id, operation, index).await;
            let agent = agents[agent_id as usize - 1].clone();
            let ctx = SectionCtx::new(section_id.clone(), operation, agent_id, index + 1);

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("无法获取并发许可: {}", e)))?;

            let ledger = self.ledger.clone();
            let task_timeout = self.task_timeout;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                section_processor::process_section(&ledger, agent.as_ref(), &ctx, task_timeout)
                    .await
            });

            let section_id = section_id.clone();
            running.push(async move { (section_id, handle.await) });
        }

        let mut report = BatchReport {
            total,
            ..BatchReport::empty(operation)
        };

        while let Some((section_id, joined)) = running.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => self.record_panic(&section_id, operation, e).await,
            };
            self.append_log(operation, &outcome);

            if outcome.is_success() {
                report.succeeded.push(outcome.section_id);
            } else {
                report.failed.push(outcome.section_id);
            }
        }

        report.elapsed = start.elapsed();
        logging::log_batch_complete(
            report.elapsed.as_secs_f64(),
            report.succeeded.len(),
            report.total,
            &report.failed,
        );

        Ok(report)
    }

    /// 台账分配的 Agent 编号；超过当前并行数时折回
    async fn agent_slot(&self, section_id: &str, operation: Operation, index: usize) -> u32 {
        let workers = self.workers as u32;
        let slot = self
            .ledger
            .assigned_worker(section_id, operation)
            .await
            .unwrap_or((index % self.workers) as u32 + 1)
            .max(1);
        (slot - 1) % workers + 1
    }

    /// 工作任务 panic 或被取消时，将台账记为失败
    async fn record_panic(
        &self,
        section_id: &str,
        operation: Operation,
        join_error: tokio::task::JoinError,
    ) -> SectionOutcome {
        let message = AgentError::Panicked {
            section_id: section_id.to_string(),
            message: join_error.to_string(),
        }
        .to_string();
        error!("  ❌ {} 任务执行失败: {}", section_id, message);

        if let Err(e) = self.ledger.mark_failed(section_id, operation, &message).await {
            error!("  ⚠️ {} 更新台账失败: {}", section_id, e);
        }

        SectionOutcome {
            section_id: section_id.to_string(),
            result: Err(message),
        }
    }

    fn append_log(&self, operation: Operation, outcome: &SectionOutcome) {
        let Some(log_file) = &self.log_file else {
            return;
        };
        let line = match &outcome.result {
            Ok(summary) => format!("[{}] {} ✅ {}", operation, outcome.section_id, summary),
            Err(message) => format!("[{}] {} ❌ {}", operation, outcome.section_id, message),
        };
        if let Err(e) = logging::append_log(log_file, &line) {
            warn!("⚠️ 写入日志文件失败: {}", e);
        }
    }
}

//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责命令级别的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：检查书籍目录、打开任务台账、创建内容生成器
//! 2. **批量命令**：research / write / review / proofread
//! 3. **状态查看**：台账统计与分组任务列表
//! 4. **恢复执行**：按固定环节顺序重新派发 pending / failed 任务
//! 5. **进度报告**：扫描全书统计字数
//! 6. **内容验证**：检查 front matter、状态和字数
//! 7. **单节执行**：不经过台账直接运行一个 Agent
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个小节的细节，委托 Dispatcher / Agent
//! - **资源所有者**：唯一持有台账和生成器的模块

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::infrastructure::JsonFileStore;
use crate::models::{Operation, StatusCounts, Task, TaskStatus};
use crate::orchestrator::dispatcher::{BatchReport, Dispatcher};
use crate::services::progress::{self, ProgressReport};
use crate::services::validation::{self, ValidationReport};
use crate::services::{
    agent_for, AgentContext, AgentOutput, ContentGenerator, SectionRepository, StubGenerator,
};
use crate::utils::logging;
use crate::workflow::TaskLedger;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// `status` 命令中每组最多显示的任务数
const STATUS_DISPLAY_LIMIT: usize = 10;

/// 应用主结构
pub struct App {
    config: Config,
    repository: Arc<SectionRepository>,
    ledger: Arc<TaskLedger>,
    generator: Arc<dyn ContentGenerator>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(book_dir: impl Into<PathBuf>, config: Config) -> AppResult<Self> {
        let book_dir = book_dir.into();
        if !tokio::fs::metadata(&book_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ConfigError::BookDirNotFound {
                path: book_dir.display().to_string(),
            }
            .into());
        }

        // 初始化日志文件
        if let Some(log_file) = &config.output_log_file {
            if let Err(e) = logging::init_log_file(log_file) {
                warn!("⚠️ 无法初始化日志文件 {}: {}", log_file, e);
            }
        }

        log_startup(&book_dir, &config);

        let repository = Arc::new(SectionRepository::new(&book_dir, &config.skill_dir));
        let store = Arc::new(JsonFileStore::new(book_dir.join(&config.state_file)));
        let ledger = Arc::new(TaskLedger::open(store, config.max_workers).await);
        let generator: Arc<dyn ContentGenerator> =
            Arc::new(StubGenerator::new(config.simulated_delay()));

        Ok(Self {
            config,
            repository,
            ledger,
            generator,
        })
    }

    /// 替换内容生成器
    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn book_dir(&self) -> &Path {
        self.repository.book_dir()
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    /// 批量执行某个环节
    pub async fn run_batch(
        &self,
        section_ids: &[String],
        operation: Operation,
    ) -> AppResult<BatchReport> {
        let report = self.dispatcher().run_parallel(section_ids, operation).await?;
        print_batch_summary(&report, &self.config);
        Ok(report)
    }

    /// 查看任务状态
    pub async fn status(&self) -> StatusCounts {
        let counts = self.ledger.get_status().await;
        let tasks = self.ledger.tasks().await;
        for line in status_lines(&counts, &tasks) {
            info!("{}", line);
        }
        counts
    }

    /// 恢复未完成的任务
    ///
    /// 按 research → write → review → proofread 的顺序，每个环节派发一批
    pub async fn resume(&self) -> AppResult<Vec<BatchReport>> {
        let pending = self.ledger.resumable().await;
        if pending.is_empty() {
            info!("✅ 没有待恢复的任务");
            return Ok(Vec::new());
        }

        info!("\n🔄 恢复 {} 个未完成的任务...", pending.len());

        let dispatcher = self.dispatcher();
        let mut reports = Vec::new();
        for operation in Operation::ALL {
            let section_ids: Vec<String> = pending
                .iter()
                .filter(|t| t.operation == operation)
                .map(|t| t.section_id.clone())
                .collect();
            if section_ids.is_empty() {
                continue;
            }

            info!("\n📋 恢复 {} 任务: {} 个", operation, section_ids.len());
            let report = dispatcher.dispatch(&section_ids, operation).await?;
            print_batch_summary(&report, &self.config);
            reports.push(report);
        }

        Ok(reports)
    }

    /// 生成写作进度报告，同时保存 progress.json
    pub async fn progress(&self) -> AppResult<ProgressReport> {
        let report = progress::scan(&self.repository).await?;
        progress::log_report(&report);

        if report.total_sections > 0 {
            match progress::save_report(&self.repository, &report).await {
                Ok(path) => info!("\n💾 进度数据已保存到: {}", path.display()),
                Err(e) => warn!("\n⚠️ 保存进度文件失败: {}", e),
            }
        }

        Ok(report)
    }

    /// 内容验证：指定节号时只验证该节，否则验证全书
    pub async fn validate(&self, section_id: Option<&str>) -> AppResult<ValidationReport> {
        let report = match section_id {
            Some(id) => {
                let file = validation::validate_section(&self.repository, id).await?;
                validation::log_file(&file);
                ValidationReport { files: vec![file] }
            }
            None => {
                let report = validation::validate_book(&self.repository).await?;
                validation::log_report(&report);
                report
            }
        };
        Ok(report)
    }

    /// 单独运行一个 Agent 处理一个小节（不记录台账）
    pub async fn run_single(&self, operation: Operation, section_id: &str) -> AppResult<AgentOutput> {
        let agent = agent_for(operation, 1, self.agent_context());
        let timeout = self.config.task_timeout();

        match tokio::time::timeout(timeout, agent.process(section_id)).await {
            Ok(result) => {
                let output = result?;
                info!("✅ [{}] {} 完成: {}", agent.name(), section_id, output.summary);
                Ok(output)
            }
            Err(_) => Err(crate::error::AgentError::Timeout {
                section_id: section_id.to_string(),
                timeout,
            }
            .into()),
        }
    }

    fn agent_context(&self) -> AgentContext {
        AgentContext::new(self.repository.clone(), self.generator.clone())
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.ledger.clone(),
            self.agent_context(),
            self.ledger.max_workers(),
            self.config.task_timeout(),
        )
        .with_log_file(self.config.output_log_file.clone())
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(book_dir: &Path, config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多 Agent 并行写作模式");
    info!("📁 书籍目录: {}", book_dir.display());
    info!("📊 最大并行数: {}", config.max_workers);
    info!("{}", "=".repeat(60));
}

/// `status` 命令的输出行：统计加上各状态分组的任务列表
fn status_lines(counts: &StatusCounts, tasks: &[Task]) -> Vec<String> {
    if counts.total == 0 {
        return vec!["📋 暂无批量任务".to_string()];
    }

    let mut lines = vec![
        "\n📊 批量任务状态".to_string(),
        "=".repeat(50),
        format!("总任务: {}", counts.total),
        format!("  ⏳ 待处理: {}", counts.pending),
        format!("  🔄 进行中: {}", counts.running),
        format!("  ✅ 已完成: {}", counts.completed),
        format!("  ❌ 失败: {}", counts.failed),
    ];

    for (status, title) in [
        (TaskStatus::Running, "🔄 进行中"),
        (TaskStatus::Pending, "⏳ 待处理"),
        (TaskStatus::Failed, "❌ 失败"),
        (TaskStatus::Completed, "✅ 已完成"),
    ] {
        let group: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        if group.is_empty() {
            continue;
        }

        lines.push(format!("\n{} ({})", title, group.len()));
        for task in group.iter().take(STATUS_DISPLAY_LIMIT) {
            let mut line = format!(
                "  - {} ({}) [Agent-{}]",
                task.section_id, task.operation, task.agent_id
            );
            if let Some(msg) = &task.error_msg {
                line += &format!(": {}", logging::truncate_text(msg, 50));
            } else if let Some(out) = &task.output {
                line += &format!(": {}", out);
            }
            lines.push(line);
        }
        if group.len() > STATUS_DISPLAY_LIMIT {
            lines.push(format!("  ... 还有 {} 个", group.len() - STATUS_DISPLAY_LIMIT));
        }
    }

    lines
}

fn print_batch_summary(report: &BatchReport, config: &Config) {
    if report.total == 0 {
        return;
    }
    info!("{}", "=".repeat(60));
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(log_file) = &config.output_log_file {
        info!("\n日志已保存至: {}", log_file);
    }
}

use crate::error::AppResult;
use crate::models::loaders::{load_config_file, ConfigFile};
use std::path::Path;
use std::time::Duration;

/// 并行 Agent 数量上限
pub const MAX_WORKERS: usize = 5;

/// 书籍目录下的可选配置文件
pub const CONFIG_FILE_NAME: &str = "book-batch.toml";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 并行 Agent 数量（1..=5）
    pub max_workers: usize,
    /// 批量任务状态文件（相对书籍目录）
    pub state_file: String,
    /// book-writer skill 目录（相对书籍目录）
    pub skill_dir: String,
    /// 单个任务的超时时间
    pub task_timeout_secs: u64,
    /// 模拟内容生成的耗时
    pub simulated_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件，不设置则不写
    pub output_log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: 3,
            state_file: ".batch_state.json".to_string(),
            skill_dir: ".claude/skills/book-writer".to_string(),
            task_timeout_secs: 300,
            simulated_delay_ms: 300,
            verbose_logging: false,
            output_log_file: None,
        }
    }
}

impl Config {
    /// 默认值 → 书籍目录下的 book-batch.toml → 环境变量
    pub async fn load(book_dir: &Path) -> AppResult<Self> {
        let mut config = Self::default();
        if let Some(file) = load_config_file(&book_dir.join(CONFIG_FILE_NAME)).await? {
            config = config.with_file(file);
        }
        Ok(config.with_env())
    }

    /// 命令行 `--parallel` 覆盖
    pub fn with_parallel(mut self, parallel: Option<usize>) -> Self {
        if let Some(n) = parallel {
            self.max_workers = n;
        }
        self.max_workers = clamp_workers(self.max_workers);
        self
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    fn with_file(self, file: ConfigFile) -> Self {
        Self {
            max_workers: file.max_workers.unwrap_or(self.max_workers),
            state_file: file.state_file.unwrap_or(self.state_file),
            skill_dir: file.skill_dir.unwrap_or(self.skill_dir),
            task_timeout_secs: file.task_timeout_secs.unwrap_or(self.task_timeout_secs),
            simulated_delay_ms: file.simulated_delay_ms.unwrap_or(self.simulated_delay_ms),
            verbose_logging: file.verbose_logging.unwrap_or(self.verbose_logging),
            output_log_file: file.output_log_file.or(self.output_log_file),
        }
    }

    fn with_env(self) -> Self {
        Self {
            max_workers: clamp_workers(
                std::env::var("MAX_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_workers),
            ),
            state_file: std::env::var("BATCH_STATE_FILE").unwrap_or(self.state_file),
            skill_dir: std::env::var("BOOK_SKILL_DIR").unwrap_or(self.skill_dir),
            task_timeout_secs: std::env::var("TASK_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.task_timeout_secs),
            simulated_delay_ms: std::env::var("SIMULATED_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.simulated_delay_ms),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").ok().or(self.output_log_file),
        }
    }
}

/// 限制并行数量在 1..=MAX_WORKERS
pub fn clamp_workers(n: usize) -> usize {
    n.clamp(1, MAX_WORKERS)
}

use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::Operation;

/// 初始化 tracing
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n批量任务日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向日志文件追加一行
pub fn append_log(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 记录批量任务启动信息
///
/// # 参数
/// - `operation`: 操作类型
/// - `total`: 小节数量
/// - `workers`: 并行 Agent 数量
pub fn log_batch_start(operation: Operation, total: usize, workers: usize) {
    info!(
        "\n🚀 启动 {} 个并行 {} {}，共 {} 个小节...",
        workers,
        operation.agent_type(),
        operation.label(),
        total
    );
    info!("{}", "=".repeat(60));
}

/// 打印批量任务结果
///
/// # 参数
/// - `elapsed_secs`: 耗时（秒）
/// - `success`: 成功数量
/// - `total`: 总数
/// - `failed_ids`: 失败的节号
pub fn log_batch_complete(elapsed_secs: f64, success: usize, total: usize, failed_ids: &[String]) {
    info!("\n{}", "=".repeat(60));
    info!("⏱️  耗时: {:.1}秒", elapsed_secs);
    info!("✅ 成功: {}/{}", success, total);
    if !failed_ids.is_empty() {
        info!("❌ 失败: {} - {}", failed_ids.len(), failed_ids.join(", "));
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

//! 内容验证 - 业务能力层
//!
//! 检查小节 front matter 是否完整、状态是否合法、字数是否在目标范围内、
//! 正文是否含有禁忌表达。只读，不修改任何文件。

use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::front_matter;
use crate::services::progress::{self, STATUS_ORDER};
use crate::services::SectionRepository;
use crate::utils::count_words;

/// front matter 必须包含的字段
const REQUIRED_FIELDS: [&str; 4] = ["section_id", "title", "status", "target_words"];

/// 已成稿状态下不应出现的表达
pub const TABOO_PHRASES: [&str; 5] = ["本节将介绍", "综上所述", "众所周知", "毋庸置疑", "一言以蔽之"];

/// 问题级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueLevel {
    Ok,
    Info,
    Warn,
    Error,
}

impl IssueLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            IssueLevel::Ok => "✅",
            IssueLevel::Info => "ℹ️",
            IssueLevel::Warn => "⚠️",
            IssueLevel::Error => "❌",
        }
    }
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueLevel::Ok => "OK",
            IssueLevel::Info => "INFO",
            IssueLevel::Warn => "WARN",
            IssueLevel::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub level: IssueLevel,
    pub message: String,
}

impl Issue {
    fn new(level: IssueLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// 单个文件的验证结果
#[derive(Debug, Clone, PartialEq)]
pub struct FileValidation {
    pub file: String,
    pub issues: Vec<Issue>,
}

impl FileValidation {
    /// 含有 WARN 或 ERROR
    pub fn has_problems(&self) -> bool {
        self.issues.iter().any(|i| i.level >= IssueLevel::Warn)
    }

    fn count(&self, level: IssueLevel) -> usize {
        self.issues.iter().filter(|i| i.level == level).count()
    }
}

/// 全书验证汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub files: Vec<FileValidation>,
}

impl ValidationReport {
    /// 没有 WARN / ERROR 的文件数
    pub fn passed(&self) -> usize {
        self.files.iter().filter(|f| !f.has_problems()).count()
    }

    /// 有问题的文件中 WARN 的条数
    pub fn warnings(&self) -> usize {
        self.problem_files().map(|f| f.count(IssueLevel::Warn)).sum()
    }

    /// 有问题的文件中 ERROR 的条数
    pub fn errors(&self) -> usize {
        self.problem_files().map(|f| f.count(IssueLevel::Error)).sum()
    }

    fn problem_files(&self) -> impl Iterator<Item = &FileValidation> {
        self.files.iter().filter(|f| f.has_problems())
    }
}

/// 验证一个小节文件的内容
pub fn validate_content(content: &str) -> Vec<Issue> {
    let front = match front_matter::parse(content) {
        Ok(Some((front, _))) => front,
        Ok(None) => return vec![Issue::new(IssueLevel::Warn, "缺少 YAML front matter")],
        Err(e) => {
            return vec![Issue::new(
                IssueLevel::Error,
                format!("front matter 解析失败: {}", e),
            )]
        }
    };

    let mut issues = Vec::new();

    let present = [
        front.section_id.is_some(),
        front.title.is_some(),
        front.status.is_some(),
        front.target_words.is_some(),
    ];
    for (field, present) in REQUIRED_FIELDS.iter().zip(present) {
        if !present {
            issues.push(Issue::new(
                IssueLevel::Warn,
                format!("front matter 缺少字段: {}", field),
            ));
        }
    }

    let status = front.status.as_deref().unwrap_or("outline");
    if !STATUS_ORDER.contains(&status) {
        issues.push(Issue::new(
            IssueLevel::Error,
            format!("无效状态: {}，有效值: {}", status, STATUS_ORDER.join(", ")),
        ));
    }

    if matches!(status, "draft" | "reviewed" | "final") {
        let target = front.target_words.unwrap_or(0);
        let actual = count_words(content);
        if actual == 0 {
            issues.push(Issue::new(
                IssueLevel::Error,
                format!("状态为 {} 但正文为空", status),
            ));
        } else if target > 0 {
            let ratio = actual as f64 / target as f64;
            let band = if ratio < 0.5 {
                Some((IssueLevel::Warn, "字数严重不足"))
            } else if ratio < 0.8 {
                Some((IssueLevel::Info, "字数偏少"))
            } else if ratio > 1.5 {
                Some((IssueLevel::Info, "字数偏多"))
            } else {
                None
            };
            if let Some((level, label)) = band {
                issues.push(Issue::new(
                    level,
                    format!("{}: {}/{} ({:.0}%)", label, actual, target, ratio * 100.0),
                ));
            }
        }

        let body = front_matter::split(content).map_or(content, |doc| doc.body);
        for phrase in TABOO_PHRASES {
            if body.contains(phrase) {
                issues.push(Issue::new(
                    IssueLevel::Warn,
                    format!("包含禁忌表达: '{}'", phrase),
                ));
            }
        }
    }

    if issues.is_empty() {
        issues.push(Issue::new(IssueLevel::Ok, "验证通过"));
    }
    issues
}

/// 验证指定小节
pub async fn validate_section(repo: &SectionRepository, section_id: &str) -> AppResult<FileValidation> {
    let path = repo.require(section_id).await?;
    validate_file(repo, &path).await
}

/// 验证全书所有小节文件
pub async fn validate_book(repo: &SectionRepository) -> AppResult<ValidationReport> {
    let mut report = ValidationReport::default();
    for chapter_dir in repo.chapter_dirs().await? {
        for path in progress::section_files(&chapter_dir).await? {
            report.files.push(validate_file(repo, &path).await?);
        }
    }
    Ok(report)
}

async fn validate_file(repo: &SectionRepository, path: &Path) -> AppResult<FileValidation> {
    let content = repo.read(path).await?;
    Ok(FileValidation {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        issues: validate_content(&content),
    })
}

/// 打印单个文件的全部结果
pub fn log_file(file: &FileValidation) {
    info!("\n🔍 验证: {}", file.file);
    for issue in &file.issues {
        info!("  {} [{}] {}", issue.level.icon(), issue.level, issue.message);
    }
}

/// 打印全书报告：只列出有问题的文件
pub fn log_report(report: &ValidationReport) {
    if report.files.is_empty() {
        warn!("⚠️ 未找到章节文件");
        return;
    }

    info!("{}", "=".repeat(60));
    info!("📋 全书内容验证报告");
    info!("{}", "=".repeat(60));

    for file in report.problem_files() {
        info!("\n📄 {}", file.file);
        for issue in file.issues.iter().filter(|i| i.level != IssueLevel::Ok) {
            info!("  {} [{}] {}", issue.level.icon(), issue.level, issue.message);
        }
    }

    info!("\n{}", "─".repeat(60));
    info!(
        "验证结果: ✅ {} 通过 | ⚠️ {} 警告 | ❌ {} 错误",
        report.passed(),
        report.warnings(),
        report.errors()
    );
    info!("共验证 {} 个文件", report.files.len());
}

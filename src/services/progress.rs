//! 写作进度统计 - 业务能力层
//!
//! 扫描各章节目录下的小节文件，按状态和章节汇总字数

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::front_matter;
use crate::services::SectionRepository;
use crate::utils::count_words;

/// 小节状态的先后顺序
pub const STATUS_ORDER: [&str; 5] = ["outline", "researched", "draft", "reviewed", "final"];

/// 不在 [`STATUS_ORDER`] 中的状态统一归入此桶
pub const OTHER_STATUS: &str = "other";

pub const PROGRESS_FILE_NAME: &str = "progress.json";

fn status_label(status: &str) -> &str {
    match status {
        "outline" => "📋 纲要",
        "researched" => "🔍 已研究",
        "draft" => "✏️ 初稿",
        "reviewed" => "✅ 已审查",
        "final" => "🎉 定稿",
        other => other,
    }
}

/// 单个小节的进度
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SectionProgress {
    pub chapter: String,
    pub file: String,
    pub section_id: String,
    pub title: String,
    pub status: String,
    pub target_words: u64,
    pub actual_words: u64,
}

/// 某一状态下的小节数与字数
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusBucket {
    pub count: usize,
    pub words: u64,
}

/// 单个章节目录的汇总
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChapterProgress {
    pub chapter: String,
    pub sections: usize,
    pub total_words: u64,
    pub total_target: u64,
}

/// 全书进度报告
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProgressReport {
    pub total_sections: usize,
    /// reviewed 或 final 的小节数
    pub completed_sections: usize,
    pub total_words: u64,
    pub total_target: u64,
    pub by_status: BTreeMap<String, StatusBucket>,
    pub chapters: Vec<ChapterProgress>,
    pub sections: Vec<SectionProgress>,
}

impl ProgressReport {
    fn add(&mut self, section: SectionProgress) {
        let bucket = if STATUS_ORDER.contains(&section.status.as_str()) {
            section.status.clone()
        } else {
            OTHER_STATUS.to_string()
        };
        let entry = self.by_status.entry(bucket).or_default();
        entry.count += 1;
        entry.words += section.actual_words;

        if section.status == "reviewed" || section.status == "final" {
            self.completed_sections += 1;
        }
        self.total_sections += 1;
        self.total_words += section.actual_words;
        self.total_target += section.target_words;

        let same_chapter = self
            .chapters
            .last()
            .is_some_and(|c| c.chapter == section.chapter);
        if !same_chapter {
            self.chapters.push(ChapterProgress {
                chapter: section.chapter.clone(),
                ..Default::default()
            });
        }
        if let Some(chapter) = self.chapters.last_mut() {
            chapter.sections += 1;
            chapter.total_words += section.actual_words;
            chapter.total_target += section.target_words;
        }

        self.sections.push(section);
    }

    /// 完成百分比（0-100）
    pub fn percent_complete(&self) -> f64 {
        if self.total_sections == 0 {
            0.0
        } else {
            self.completed_sections as f64 * 100.0 / self.total_sections as f64
        }
    }

    pub fn status_count(&self, status: &str) -> usize {
        self.by_status.get(status).map_or(0, |b| b.count)
    }
}

/// 扫描书籍目录生成进度报告
pub async fn scan(repo: &SectionRepository) -> AppResult<ProgressReport> {
    let mut report = ProgressReport::default();

    for chapter_dir in repo.chapter_dirs().await? {
        let chapter = file_name(&chapter_dir);
        for path in section_files(&chapter_dir).await? {
            let content = repo.read(&path).await?;
            report.add(section_progress(&chapter, &path, &content));
        }
    }

    Ok(report)
}

/// 将报告写入 `<book>/progress.json`
pub async fn save_report(repo: &SectionRepository, report: &ProgressReport) -> AppResult<PathBuf> {
    let path = repo.book_dir().join(PROGRESS_FILE_NAME);
    let json = serde_json::to_string_pretty(report)?;
    repo.write(&path, &json).await?;
    Ok(path)
}

/// 打印进度报告
pub fn log_report(report: &ProgressReport) {
    if report.total_sections == 0 {
        warn!("⚠️ 未找到章节文件");
        return;
    }

    let pct = report.percent_complete();
    let bar_len = 30;
    let filled = (bar_len as f64 * pct / 100.0) as usize;
    let bar = "█".repeat(filled) + &"░".repeat(bar_len - filled);

    info!("{}", "=".repeat(70));
    info!("📚 写作进度报告");
    info!("{}", "=".repeat(70));
    info!(
        "总体进度: [{}] {:.0}% ({}/{} 节完成)",
        bar, pct, report.completed_sections, report.total_sections
    );
    info!("总字数: {} / {} 目标字数", report.total_words, report.total_target);

    info!("\n状态分布");
    info!("{}", "-".repeat(40));
    for status in STATUS_ORDER.iter().copied().chain([OTHER_STATUS]) {
        if let Some(bucket) = report.by_status.get(status) {
            info!(
                "  {:<12} {:>3} 节  {:>8} 字",
                status_label(status),
                bucket.count,
                bucket.words
            );
        }
    }

    for chapter in &report.chapters {
        let cpct = if chapter.total_target > 0 {
            chapter.total_words as f64 * 100.0 / chapter.total_target as f64
        } else {
            0.0
        };
        info!("\n{}", "─".repeat(70));
        info!(
            "📖 {}  ({}/{} 字, {:.0}%)",
            chapter.chapter, chapter.total_words, chapter.total_target, cpct
        );
        info!("{}", "─".repeat(70));

        for s in report.sections.iter().filter(|s| s.chapter == chapter.chapter) {
            let title: String = s.title.chars().take(26).collect();
            info!(
                "  {:<8} {:<28} {:<10} {:>6}/{}",
                s.section_id,
                title,
                status_label(&s.status),
                s.actual_words,
                s.target_words
            );
        }
    }
}

// ========== 辅助函数 ==========

fn section_progress(chapter: &str, path: &Path, content: &str) -> SectionProgress {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let front = match front_matter::parse(content) {
        Ok(parsed) => parsed.map(|(front, _)| front),
        Err(e) => {
            warn!("⚠️ front matter 解析失败，按纲要状态统计: {} ({})", path.display(), e);
            None
        }
    };
    let front = front.unwrap_or_default();

    SectionProgress {
        chapter: chapter.to_string(),
        file: file_name(path),
        section_id: front.section_id.unwrap_or_else(|| "?".to_string()),
        title: front.title.unwrap_or(stem),
        status: front.status.unwrap_or_else(|| "outline".to_string()),
        target_words: front.target_words.unwrap_or(0),
        actual_words: count_words(content),
    }
}

/// 章节目录下的小节文件，跳过组装后的整章文件
pub(crate) async fn section_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = file_name(&path);
        if !name.ends_with(".md") || name.contains("_完整") || name.contains("_第") {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

//! 各环节 Agent - 业务能力层
//!
//! 每个 Agent 只处理"一个小节"，不更新台账、不关心并发，
//! 由编排层决定何时调用以及如何记录结果。

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{FrontMatter, FrontMatterPatch, Operation};
use crate::services::generator::{
    ContentGenerator, GenerationInput, GenerationRequest, REVIEW_PASSED_MARK,
};
use crate::services::{proofread, SectionRepository};
use crate::utils::count_words;

/// Agent 处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// 写入台账的一行摘要
    pub summary: String,
}

impl AgentOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

/// 小节处理能力
#[async_trait]
pub trait SectionAgent: Send + Sync {
    /// 形如 `ResearchAgent-2`
    fn name(&self) -> &str;

    fn operation(&self) -> Operation;

    async fn process(&self, section_id: &str) -> AppResult<AgentOutput>;
}

/// Agent 共享的依赖
#[derive(Clone)]
pub struct AgentContext {
    pub repository: Arc<SectionRepository>,
    pub generator: Arc<dyn ContentGenerator>,
}

impl AgentContext {
    pub fn new(repository: Arc<SectionRepository>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            repository,
            generator,
        }
    }
}

/// 根据操作类型创建对应的 Agent
pub fn agent_for(operation: Operation, agent_id: u32, ctx: AgentContext) -> Arc<dyn SectionAgent> {
    let name = format!("{}-{}", operation.agent_type(), agent_id);
    match operation {
        Operation::Research => Arc::new(ResearchAgent { name, ctx }),
        Operation::Write => Arc::new(WritingAgent { name, ctx }),
        Operation::Review => Arc::new(ReviewAgent { name, ctx }),
        Operation::Proofread => Arc::new(EditorAgent { name, ctx }),
    }
}

/// 研究 Agent：整理研究主题，生成研究笔记
pub struct ResearchAgent {
    name: String,
    ctx: AgentContext,
}

#[async_trait]
impl SectionAgent for ResearchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self) -> Operation {
        Operation::Research
    }

    async fn process(&self, section_id: &str) -> AppResult<AgentOutput> {
        info!("  🤖 [{}] 开始研究: {}", self.name, section_id);
        let repo = &self.ctx.repository;

        // 1. 读取研究主题清单
        let topics = match read_optional(repo, &repo.reference_file("research-topics.md")).await? {
            Some(content) => extract_topics(&content, section_id),
            None => Vec::new(),
        };
        let topics = if topics.is_empty() {
            vec![format!("{} 相关主题", section_id)]
        } else {
            topics
        };

        // 2. 生成研究笔记
        let response = self
            .ctx
            .generator
            .generate(GenerationRequest {
                operation: Operation::Research,
                section_id: section_id.to_string(),
                input: GenerationInput::Topics(topics),
            })
            .await?;

        // 3. 保存研究笔记
        let file_name = format!("{}_research.md", section_id);
        let research_file = repo.assets_dir("research").join(&file_name);
        repo.write(&research_file, &response.body).await?;

        // 4. 更新小节状态
        if let Some(section_file) = repo.find(section_id).await? {
            repo.patch(&section_file, &FrontMatterPatch::status("researched"))
                .await?;
        }

        Ok(AgentOutput::new(format!("研究笔记已保存: {}", file_name)))
    }
}

/// 写作 Agent：根据纲要和研究笔记生成初稿
pub struct WritingAgent {
    name: String,
    ctx: AgentContext,
}

#[async_trait]
impl SectionAgent for WritingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self) -> Operation {
        Operation::Write
    }

    async fn process(&self, section_id: &str) -> AppResult<AgentOutput> {
        info!("  🤖 [{}] 开始撰写: {}", self.name, section_id);
        let repo = &self.ctx.repository;

        // 1. 研究笔记
        let research_file = repo
            .assets_dir("research")
            .join(format!("{}_research.md", section_id));
        let research = read_optional(repo, &research_file).await?.unwrap_or_default();

        // 2. 纲要
        let outline = read_optional(repo, &repo.reference_file("outline.md"))
            .await?
            .and_then(|content| extract_outline(&content, section_id))
            .unwrap_or_default();

        // 3. 撰写
        let response = self
            .ctx
            .generator
            .generate(GenerationRequest {
                operation: Operation::Write,
                section_id: section_id.to_string(),
                input: GenerationInput::Draft { outline, research },
            })
            .await?;

        let words = count_words(&response.body);
        let patch = FrontMatterPatch::status("draft").with_word_count(words);

        // 4. 写入小节文件
        match repo.find(section_id).await? {
            Some(section_file) => {
                repo.replace_body(&section_file, &response.body, &patch, new_section(section_id))
                    .await?;
            }
            None => warn!("  ⚠️ [{}] 未找到小节文件 {}，初稿未写入", self.name, section_id),
        }

        Ok(AgentOutput::new(format!("已撰写 {} 字", words)))
    }
}

/// 审查 Agent：六维度审查
pub struct ReviewAgent {
    name: String,
    ctx: AgentContext,
}

#[async_trait]
impl SectionAgent for ReviewAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self) -> Operation {
        Operation::Review
    }

    async fn process(&self, section_id: &str) -> AppResult<AgentOutput> {
        info!("  🤖 [{}] 开始审查: {}", self.name, section_id);
        let repo = &self.ctx.repository;

        let section_file = repo.require(section_id).await?;
        let content = repo.read(&section_file).await?;

        let report = self
            .ctx
            .generator
            .generate(GenerationRequest {
                operation: Operation::Review,
                section_id: section_id.to_string(),
                input: GenerationInput::Content(content),
            })
            .await?
            .body;

        let review_file = repo
            .assets_dir("review")
            .join(format!("{}_review.md", section_id));
        repo.write(&review_file, &report).await?;

        if report.contains(REVIEW_PASSED_MARK) {
            repo.patch(&section_file, &FrontMatterPatch::status("reviewed"))
                .await?;
        }

        Ok(AgentOutput::new("审查报告已生成"))
    }
}

/// 校对 Agent：责任编辑检查
///
/// 不经过生成器，直接运行确定性检查；有严重问题时不定稿
pub struct EditorAgent {
    name: String,
    ctx: AgentContext,
}

#[async_trait]
impl SectionAgent for EditorAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self) -> Operation {
        Operation::Proofread
    }

    async fn process(&self, section_id: &str) -> AppResult<AgentOutput> {
        info!("  🤖 [{}] 开始校对: {}", self.name, section_id);
        let repo = &self.ctx.repository;

        let section_file = repo.require(section_id).await?;
        let content = repo.read(&section_file).await?;

        let result = proofread::proofread(&content);
        let report = proofread::render_report(section_id, &self.name, &result);

        let edit_file = repo.assets_dir("edit").join(format!("{}_edit.md", section_id));
        repo.write(&edit_file, &report).await?;

        let summary = format!(
            "严重={}, 警告={}, 建议={}",
            result.critical_issues(),
            result.warnings(),
            result.suggestions()
        );
        if result.passed() {
            repo.patch(&section_file, &FrontMatterPatch::status("final"))
                .await?;
            Ok(AgentOutput::new(format!("校对完成 ({})", summary)))
        } else {
            warn!("  ⚠️ [{}] {} 发现严重问题，未定稿", self.name, section_id);
            Ok(AgentOutput::new(format!("校对发现严重问题 ({})", summary)))
        }
    }
}

// ========== 辅助函数 ==========

async fn read_optional(repo: &SectionRepository, path: &Path) -> AppResult<Option<String>> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        repo.read(path).await.map(Some)
    } else {
        Ok(None)
    }
}

/// 新建小节文件时使用的 front matter
fn new_section(section_id: &str) -> FrontMatter {
    FrontMatter {
        section_id: Some(section_id.to_string()),
        title: Some("待填写标题".to_string()),
        status: Some("draft".to_string()),
        word_count: Some(0),
        target_words: Some(3000),
        ..Default::default()
    }
}

/// `N.M` 形式的节号前缀
static DOTTED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d").expect("valid regex"));

/// 找到以节号开头的那一行，返回其后直到 `is_next_entry` 命中之前的文本
fn section_block<'a>(
    content: &'a str,
    section_id: &str,
    is_next_entry: fn(&str) -> bool,
) -> Option<&'a str> {
    let pattern = format!(r"(?m)^[#\s]*{}[.\s:：]+", regex::escape(section_id));
    let re = Regex::new(&pattern).ok()?;
    let start = re.find(content)?.end();
    let rest = &content[start..];

    let mut end = rest.len();
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if offset > 0 && is_next_entry(line) {
            end = offset;
            break;
        }
        offset += line.len();
    }
    Some(&rest[..end])
}

/// 顶格行去掉 `#` 标题前缀后的文本；缩进行返回 `None`
fn unindented_entry(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    Some(line.trim_start_matches('#').trim_start())
}

/// 研究主题清单中下一条目：顶格、以数字开头
fn is_next_topic_entry(line: &str) -> bool {
    unindented_entry(line).is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

/// 纲要中下一小节：顶格、以 `N.M` 开头，缩进或编号列表不算
fn is_next_outline_entry(line: &str) -> bool {
    unindented_entry(line).is_some_and(|rest| DOTTED_ID.is_match(rest))
}

/// 研究主题：节号条目下所有以 `-` 开头的行（去掉列表符号）
fn extract_topics(content: &str, section_id: &str) -> Vec<String> {
    section_block(content, section_id, is_next_topic_entry)
        .map(|block| {
            block
                .lines()
                .filter_map(|line| line.trim().strip_prefix('-'))
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// 纲要：节号条目下的全部文本
fn extract_outline(content: &str, section_id: &str) -> Option<String> {
    section_block(content, section_id, is_next_outline_entry)
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
}

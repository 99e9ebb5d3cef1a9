//! 内容生成 - 业务能力层
//!
//! Agent 通过请求/响应的方式获取内容，真实的生成服务（知识库查询、LLM 写作等）
//! 只需实现 [`ContentGenerator`]。这里自带的 [`StubGenerator`] 用固定延迟加模板文本模拟。

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::AppResult;
use crate::models::Operation;
use crate::utils::truncate_text;

/// 生成请求的输入
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationInput {
    /// 研究主题
    Topics(Vec<String>),
    /// 纲要与研究笔记
    Draft { outline: String, research: String },
    /// 待审查的小节全文
    Content(String),
}

/// 生成请求
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub operation: Operation,
    pub section_id: String,
    pub input: GenerationInput,
}

/// 生成结果
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub body: String,
}

/// 内容生成服务
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationResponse>;
}

/// 审查报告中表示六个维度全部通过的标记
pub const REVIEW_PASSED_MARK: &str = "✅ 全部通过";

/// 审查维度
const REVIEW_DIMENSIONS: [(&str, &str); 6] = [
    ("完整性", "对照纲要检查内容覆盖度"),
    ("准确性", "事实性内容核查"),
    ("风格", "符合style-guide要求"),
    ("衔接", "与前后节过渡自然度"),
    ("字数", "是否在目标范围内"),
    ("示例", "代码和案例质量"),
];

/// 模拟生成器：等待固定时间后返回模板文本
#[derive(Debug, Clone)]
pub struct StubGenerator {
    delay: Duration,
}

impl StubGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn research_note(section_id: &str, topics: &[String]) -> String {
        let mut content = format!("# {} 研究笔记\n\n", section_id);
        content += &format!("生成时间: {}\n\n", now_iso());
        content += "## 研究主题\n\n";
        for topic in topics {
            content += &format!("- {}\n", topic);
        }
        content += "\n## 关键资料\n\n";
        content += "> 注: 实际使用时通过 /notebooklm skill 查询详细资料\n";
        content
    }

    fn draft(outline: &str, research: &str) -> String {
        let research = if research.is_empty() {
            "（暂无研究笔记）".to_string()
        } else {
            truncate_text(research, 500)
        };
        format!(
            "\n# 待填写标题\n\n## 引言\n\n（此处撰写引言，以痛点/钩子开头）\n\n## 正文\n\n（根据纲要撰写正文）\n\n纲要要点:\n{}\n\n研究资料参考:\n{}\n\n## 小结\n\n（总结本节要点，自然过渡）\n",
            outline, research
        )
    }

    fn review_report(section_id: &str) -> String {
        let mut report = format!("# {} 审查报告\n\n", section_id);
        report += &format!("审查时间: {}\n\n", now_iso());
        report += "## 审查结果\n\n";
        for (dim, desc) in REVIEW_DIMENSIONS {
            report += &format!("- **{}**: {} - ✅ 通过\n", dim, desc);
        }
        report += "\n## 详细反馈\n\n";
        report += "（此处将生成详细审查意见）\n\n";
        report += &format!("### {}\n", REVIEW_PASSED_MARK);
        report
    }
}

#[async_trait]
impl ContentGenerator for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationResponse> {
        debug!(
            "模拟生成: {} {} (延迟 {:?})",
            request.operation, request.section_id, self.delay
        );
        tokio::time::sleep(self.delay).await;

        let body = match (request.operation, &request.input) {
            (Operation::Research, GenerationInput::Topics(topics)) => {
                Self::research_note(&request.section_id, topics)
            }
            (Operation::Write, GenerationInput::Draft { outline, research }) => {
                Self::draft(outline, research)
            }
            (Operation::Review, _) => Self::review_report(&request.section_id),
            (operation, _) => {
                return Err(crate::error::AgentError::Generation {
                    operation,
                    message: "请求输入与操作不匹配".to_string(),
                }
                .into())
            }
        };

        Ok(GenerationResponse { body })
    }
}

fn now_iso() -> String {
    chrono::Local::now().naive_local().to_string()
}

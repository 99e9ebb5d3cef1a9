//! 校对检查 - 业务能力层
//!
//! 责任编辑的确定性检查：术语一致性、禁用词、格式规范、标点符号、内容质量。
//! 只有禁用词算严重问题，存在严重问题时小节不能定稿。

use regex::Regex;
use std::sync::LazyLock;

use crate::models::front_matter;

/// 术语表：标准写法及其允许出现的变体
pub const TERMINOLOGY: &[(&str, &[&str])] = &[
    ("OpenClaw", &["OpenClaw", "openclaw"]),
    ("Gateway", &["Gateway", "gateway"]),
    ("Agent", &["Agent", "agent"]),
    ("GEPA", &["GEPA", "gepa"]),
    ("Skill", &["Skill", "skill"]),
    ("ClawdHub", &["ClawdHub", "clawdhub"]),
    ("Lobster", &["Lobster", "lobster"]),
    ("Moltbook", &["Moltbook", "moltbook"]),
    ("OPC", &["OPC", "opc"]),
];

/// 出版稿中不允许出现的表达
pub const FORBIDDEN_WORDS: &[&str] = &[
    "本节将介绍",
    "综上所述",
    "值得一提的是",
    "不难发现",
    "显而易见",
    "简而言之",
    "换句话说",
    "从某种意义上说",
    "众所周知",
    "本文",
    "笔者",
    "我们",
];

/// 报告中每类最多列出的禁用词位置
const FORBIDDEN_DISPLAY_LIMIT: usize = 10;

static TERM_PATTERNS: LazyLock<Vec<(&'static str, Vec<(&'static str, Regex)>)>> =
    LazyLock::new(|| {
        TERMINOLOGY
            .iter()
            .map(|(standard, variants)| {
                let patterns = variants
                    .iter()
                    .map(|v| {
                        let re = Regex::new(&format!(r"\b{}\b", regex::escape(v)))
                            .expect("valid regex");
                        (*v, re)
                    })
                    .collect();
                (*standard, patterns)
            })
            .collect()
    });
static H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s").expect("valid regex"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +\n").expect("valid regex"));
static MIXED_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}][!,;:?]").expect("valid regex"));
static REPEATED_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。，！？]{2,}").expect("valid regex"));
static CJK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]").expect("valid regex"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("valid regex"));

/// 同一术语出现了非主流写法
#[derive(Debug, Clone, PartialEq)]
pub struct TermVariant {
    pub term: String,
    pub found: String,
    pub should_be: String,
    pub count: usize,
}

/// 禁用词出现的位置（行号从 1 开始）
#[derive(Debug, Clone, PartialEq)]
pub struct ForbiddenHit {
    pub word: String,
    pub line: usize,
}

/// 一个小节的校对结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProofreadResult {
    pub terminology: Vec<TermVariant>,
    pub forbidden: Vec<ForbiddenHit>,
    pub format: Vec<String>,
    pub punctuation: Vec<String>,
    pub quality: Vec<String>,
}

impl ProofreadResult {
    /// 严重问题：禁用词
    pub fn critical_issues(&self) -> usize {
        self.forbidden.len()
    }

    /// 警告：术语不一致、格式问题
    pub fn warnings(&self) -> usize {
        self.terminology.len() + self.format.len()
    }

    /// 建议：标点与内容质量
    pub fn suggestions(&self) -> usize {
        self.punctuation.len() + self.quality.len()
    }

    pub fn passed(&self) -> bool {
        self.critical_issues() == 0
    }
}

/// 对小节正文执行全部校对检查（front matter 不参与）
pub fn proofread(content: &str) -> ProofreadResult {
    let body = front_matter::split(content)
        .map(|doc| doc.body)
        .unwrap_or(content);

    ProofreadResult {
        terminology: check_terminology(body),
        forbidden: check_forbidden_words(body),
        format: check_format(body),
        punctuation: check_punctuation(body),
        quality: check_quality(body),
    }
}

/// 生成 `assets/edit/<id>_edit.md` 的报告内容
pub fn render_report(section_id: &str, agent_name: &str, result: &ProofreadResult) -> String {
    let mut lines = vec![
        format!("# {} 校对报告", section_id),
        String::new(),
        format!("校对时间: {}", chrono::Local::now().naive_local()),
        format!("Agent: {}", agent_name),
        String::new(),
        "## 检查统计".to_string(),
        String::new(),
        format!("- 严重问题: {}", result.critical_issues()),
        format!("- 警告: {}", result.warnings()),
        format!("- 建议: {}", result.suggestions()),
        String::new(),
        "## 详细检查结果".to_string(),
        String::new(),
    ];

    let terms: Vec<String> = result
        .terminology
        .iter()
        .map(|t| format!("- '{}' 应统一为 '{}' (出现{}次)", t.found, t.should_be, t.count))
        .collect();
    push_section(&mut lines, "术语一致性", "❌", &terms, true);

    let mut forbidden: Vec<String> = result
        .forbidden
        .iter()
        .take(FORBIDDEN_DISPLAY_LIMIT)
        .map(|hit| format!("- 第{}行: \"{}\"", hit.line, hit.word))
        .collect();
    if result.forbidden.len() > FORBIDDEN_DISPLAY_LIMIT {
        forbidden.push(format!(
            "- ... 还有 {} 处",
            result.forbidden.len() - FORBIDDEN_DISPLAY_LIMIT
        ));
    }
    push_section(&mut lines, "禁用词", "❌", &forbidden, true);

    let bullets = |items: &[String]| items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>();
    push_section(&mut lines, "格式规范", "⚠️", &bullets(&result.format), true);
    push_section(&mut lines, "标点符号", "💡", &bullets(&result.punctuation), false);
    push_section(&mut lines, "内容质量", "💡", &bullets(&result.quality), false);

    lines.push("## 总结".to_string());
    lines.push(String::new());
    if result.passed() {
        lines.push("✅ **校对通过** - 该节已达到出版标准".to_string());
    } else {
        lines.push(format!(
            "❌ **需要修改** - 请先处理 {} 个严重问题",
            result.critical_issues()
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn push_section(lines: &mut Vec<String>, name: &str, icon: &str, items: &[String], show_pass: bool) {
    if !items.is_empty() {
        lines.push(format!("### {} {}", icon, name));
        lines.push(String::new());
        lines.extend(items.iter().cloned());
        lines.push(String::new());
    } else if show_pass {
        lines.push(format!("### ✅ {}", name));
        lines.push(String::new());
        lines.push("检查通过，未发现明显问题。".to_string());
        lines.push(String::new());
    }
}

// ========== 各项检查 ==========

fn check_terminology(body: &str) -> Vec<TermVariant> {
    let mut result = Vec::new();
    for (standard, patterns) in TERM_PATTERNS.iter() {
        let counts: Vec<(&str, usize)> = patterns
            .iter()
            .map(|(variant, re)| (*variant, re.find_iter(body).count()))
            .filter(|(_, count)| *count > 0)
            .collect();
        if counts.len() < 2 {
            continue;
        }

        // 出现最多的写法为准，次数相同取术语表中靠前的
        let mut main = counts[0];
        for &candidate in &counts[1..] {
            if candidate.1 > main.1 {
                main = candidate;
            }
        }
        for (variant, count) in counts {
            if variant != main.0 {
                result.push(TermVariant {
                    term: standard.to_string(),
                    found: variant.to_string(),
                    should_be: main.0.to_string(),
                    count,
                });
            }
        }
    }
    result
}

fn check_forbidden_words(body: &str) -> Vec<ForbiddenHit> {
    FORBIDDEN_WORDS
        .iter()
        .flat_map(|word| {
            body.match_indices(word).map(move |(pos, _)| ForbiddenHit {
                word: word.to_string(),
                line: body[..pos].matches('\n').count() + 1,
            })
        })
        .collect()
}

fn check_format(body: &str) -> Vec<String> {
    let mut issues = Vec::new();

    let bare_fences = unlabeled_code_blocks(body);
    if bare_fences > 0 {
        issues.push(format!(
            "有 {} 个代码块未指定语言，应添加如 ```python",
            bare_fences
        ));
    }

    let h1 = H1.find_iter(body).count();
    if h1 > 1 {
        issues.push(format!("有 {} 个一级标题，应只有一个", h1));
    }

    let blank_runs = BLANK_RUN.find_iter(body).count();
    if blank_runs > 0 {
        issues.push(format!("有 {} 处连续空行超过3个", blank_runs));
    }

    let trailing = TRAILING_SPACE.find_iter(body).count();
    if trailing > 10 {
        issues.push(format!("有 {} 行包含行尾空格", trailing));
    }

    issues
}

/// 开头围栏没有语言标记的代码块数
fn unlabeled_code_blocks(body: &str) -> usize {
    let mut in_block = false;
    let mut count = 0;
    for line in body.lines() {
        let Some(info) = line.trim_start().strip_prefix("```") else {
            continue;
        };
        if !in_block && info.trim().is_empty() {
            count += 1;
        }
        in_block = !in_block;
    }
    count
}

fn check_punctuation(body: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if MIXED_PUNCT.is_match(body) {
        issues.push("中英文标点混用: 中文后使用了英文标点".to_string());
    }

    let repeated = REPEATED_PUNCT.find_iter(body).count();
    if repeated > 0 {
        issues.push(format!("有 {} 处连续标点", repeated));
    }

    let open = body.matches(['（', '(']).count();
    let close = body.matches(['）', ')']).count();
    if open != close {
        issues.push(format!("括号不匹配: 左{}个，右{}个", open, close));
    }

    issues
}

fn check_quality(body: &str) -> Vec<String> {
    let mut suggestions = Vec::new();
    let cjk = CJK.find_iter(body).count();

    if cjk < 500 {
        suggestions.push(format!("内容较短 ({}字)，建议扩充", cjk));
    }
    if cjk > 2000 && !IMAGE.is_match(body) {
        suggestions.push("长章节建议添加图表说明".to_string());
    }
    if cjk > 2000 && LINK.find_iter(body).count() < 2 {
        suggestions.push("建议添加更多参考链接".to_string());
    }

    let long_paragraphs = body
        .split("\n\n")
        .filter(|p| !p.trim().is_empty() && p.chars().count() > 600)
        .count();
    if long_paragraphs > 2 {
        suggestions.push(format!("有 {} 个段落较长，建议拆分", long_paragraphs));
    }

    suggestions
}

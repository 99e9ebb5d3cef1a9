//! 文本统计

use std::sync::LazyLock;

use regex::Regex;

use crate::models::front_matter;

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("valid regex"));
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*`]").expect("valid regex"));
static CJK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]").expect("valid regex"));
static LATIN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid regex"));

/// 统计正文字数：中文字符数 + 英文单词数
///
/// front matter、图片、链接和 `#*\`` 标记不计入
pub fn count_words(content: &str) -> u64 {
    let body = front_matter::split(content)
        .map(|doc| doc.body)
        .unwrap_or(content);

    let text = IMAGE.replace_all(body, "");
    let text = LINK.replace_all(&text, " ");
    let text = MARKUP.replace_all(&text, "");

    (CJK.find_iter(&text).count() + LATIN_WORD.find_iter(&text).count()) as u64
}

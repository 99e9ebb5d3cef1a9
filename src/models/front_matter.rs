//! 小节文件的 front matter
//!
//! 文件以 `---` 行开头，到下一个 `---` 行结束，中间是 YAML。
//! 已知字段解析为强类型，其余字段原样保存在 `extra` 中，重新写回时不丢失。

use serde::{Deserialize, Serialize};

/// 小节元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub section_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_words: Option<u64>,
    /// 未识别的字段，保持原有顺序
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// 对 front matter 的局部修改，只覆盖给出的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatterPatch {
    pub status: Option<String>,
    pub word_count: Option<u64>,
}

impl FrontMatterPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn with_word_count(mut self, word_count: u64) -> Self {
        self.word_count = Some(word_count);
        self
    }
}

impl FrontMatter {
    /// 合并修改：补丁中的字段覆盖原值，`extra` 不受影响
    pub fn merge(&mut self, patch: &FrontMatterPatch) {
        if let Some(status) = &patch.status {
            self.status = Some(status.clone());
        }
        if let Some(word_count) = patch.word_count {
            self.word_count = Some(word_count);
        }
    }

    /// 序列化为 YAML 文本（不含分隔行）
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// 拆分后的文档：front matter 原文和正文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    pub yaml: &'a str,
    pub body: &'a str,
}

/// 拆分 front matter 与正文
///
/// 没有合法的起止分隔行时返回 `None`
pub fn split(content: &str) -> Option<SplitDocument<'_>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = strip_delimiter_line(content)?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(SplitDocument {
                yaml: &rest[..offset],
                body: &rest[offset + line.len()..],
            });
        }
        offset += line.len();
    }
    None
}

/// 解析 front matter
///
/// - 没有 front matter 时返回 `Ok(None)`
/// - YAML 非法时返回错误
pub fn parse(content: &str) -> Result<Option<(FrontMatter, &str)>, serde_yaml::Error> {
    let Some(doc) = split(content) else {
        return Ok(None);
    };

    let mut front: FrontMatter = if doc.yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(doc.yaml)?
    };

    // "1.10" 这类节号会被 YAML 当成浮点数，直接取原文
    if let Some(raw) = raw_value(doc.yaml, "section_id") {
        front.section_id = Some(raw);
    }

    Ok(Some((front, doc.body)))
}

/// 用新的 front matter 重新拼装文档，正文保持不变
pub fn render(front: &FrontMatter, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = front.to_yaml()?;
    Ok(format!("---\n{}---\n{}", yaml, body))
}

fn strip_delimiter_line(content: &str) -> Option<&str> {
    let newline = content.find('\n')?;
    if content[..newline].trim_end() == "---" {
        Some(&content[newline + 1..])
    } else {
        None
    }
}

fn raw_value(yaml: &str, key: &str) -> Option<String> {
    yaml.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim() != key {
            return None;
        }
        let v = v.trim().trim_matches('"').trim_matches('\'');
        (!v.is_empty()).then(|| v.to_string())
    })
}

// 把字符串或数字统一反序列化为字符串
fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(ScalarVisitor)
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

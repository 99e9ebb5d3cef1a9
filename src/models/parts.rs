//! 章节分组表
//!
//! 命令行的节号参数既可以是逗号分隔的列表，也可以是分组名（`part1` … `part5`、`all`）。

use phf::phf_map;

use crate::error::{AppError, AppResult};

const PART1: &[&str] = &["1.1", "1.2", "1.3", "2.1", "2.2", "2.3", "3.1", "3.2", "3.3", "3.4"];
const PART2: &[&str] = &[
    "4.1", "4.2", "4.3", "4.4", "4.5", "5.1", "5.2", "5.3", "5.4", "6.1", "6.2", "6.3", "6.4",
    "7.1", "7.2", "7.3", "7.4",
];
const PART3: &[&str] = &[
    "8.1", "8.2", "8.3", "9.1", "9.2", "9.3", "9.4", "9.5", "9.6", "10.1", "10.2", "10.3", "10.4",
    "10.5", "10.6",
];
const PART4: &[&str] = &[
    "11.1", "11.2", "11.3", "11.4", "12.1", "12.2", "12.3", "12.4", "13.1", "13.2", "13.3",
];
const PART5: &[&str] = &["14.1", "14.2", "14.3", "15.1", "15.2"];

/// 分组名 → 节号列表
pub static PART_SECTIONS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "part1" => PART1,
    "part2" => PART2,
    "part3" => PART3,
    "part4" => PART4,
    "part5" => PART5,
};

/// `all` 展开时的分组顺序
const PART_ORDER: [&str; 5] = ["part1", "part2", "part3", "part4", "part5"];

/// 展开节号参数
pub fn expand_section_ids(arg: &str) -> Vec<String> {
    let arg = arg.trim();
    if arg == "all" {
        return PART_ORDER
            .iter()
            .filter_map(|part| PART_SECTIONS.get(*part))
            .flat_map(|sections| sections.iter().map(|s| s.to_string()))
            .collect();
    }
    if let Some(sections) = PART_SECTIONS.get(arg) {
        return sections.iter().map(|s| s.to_string()).collect();
    }
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 解析命令行的节号参数
///
/// 未知的分组名（如 `part9`）或展开后为空都视为参数错误
pub fn parse_section_arg(arg: &str) -> AppResult<Vec<String>> {
    let trimmed = arg.trim();
    if trimmed.starts_with("part") && !PART_SECTIONS.contains_key(trimmed) {
        return Err(AppError::invalid_value("分组", trimmed));
    }
    let ids = expand_section_ids(trimmed);
    if ids.is_empty() {
        return Err(AppError::invalid_value("节号", arg));
    }
    Ok(ids)
}

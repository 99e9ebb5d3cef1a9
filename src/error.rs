use crate::models::{Operation, TaskStatus};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 任务台账错误
    #[error("台账错误: {0}")]
    Ledger(#[from] LedgerError),
    /// 小节文件错误
    #[error("小节错误: {0}")]
    Section(#[from] SectionError),
    /// Agent 执行错误
    #[error("Agent错误: {0}")]
    Agent(#[from] AgentError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 任务台账错误
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 状态文件无法解析
    #[error("状态文件已损坏 ({path}): {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 状态序列化失败
    #[error("状态序列化失败: {0}")]
    Serialize(#[source] serde_json::Error),
    /// 状态写入失败
    #[error("保存状态文件失败 ({path}): {source}")]
    PersistFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 非法的状态流转
    #[error("任务 {section_id} ({operation}) 不允许从 {from} 变为 {to}")]
    InvalidTransition {
        section_id: String,
        operation: Operation,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// 小节文件错误
#[derive(Debug, Error)]
pub enum SectionError {
    /// 找不到小节文件
    #[error("未找到小节文件: {section_id}")]
    NotFound { section_id: String },
    /// Front matter 解析失败
    #[error("front matter 解析失败 ({path}): {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Agent 执行错误
#[derive(Debug, Error)]
pub enum AgentError {
    /// 任务超时
    #[error("任务超时 ({timeout:?})")]
    Timeout {
        section_id: String,
        timeout: std::time::Duration,
    },
    /// 内容生成失败
    #[error("{operation} 内容生成失败: {message}")]
    Generation {
        operation: Operation,
        message: String,
    },
    /// 工作任务异常退出
    #[error("任务异常退出 ({section_id}): {message}")]
    Panicked { section_id: String, message: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 书籍目录不存在
    #[error("目录不存在: {path}")]
    BookDirNotFound { path: String },
    /// 未知的章节分组或操作
    #[error("无效的参数 {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// ========== 从常见错误类型转换 ==========
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动转换

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Ledger(LedgerError::Serialize(err))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Section(SectionError::FrontMatter {
            path: String::new(),
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::TomlParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建小节不存在错误
    pub fn section_not_found(section_id: impl Into<String>) -> Self {
        AppError::Section(SectionError::NotFound {
            section_id: section_id.into(),
        })
    }

    /// 创建参数错误
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

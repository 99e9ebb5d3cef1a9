use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// `book-batch.toml` 中允许出现的字段，缺省的字段沿用默认配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub max_workers: Option<usize>,
    pub state_file: Option<String>,
    pub skill_dir: Option<String>,
    pub task_timeout_secs: Option<u64>,
    pub simulated_delay_ms: Option<u64>,
    pub verbose_logging: Option<bool>,
    pub output_log_file: Option<String>,
}

/// 读取配置文件，文件不存在时返回 `None`
pub async fn load_config_file(path: &Path) -> AppResult<Option<ConfigFile>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::file_read_failed(path.display().to_string(), e)),
    };

    let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!("已加载配置文件: {}", path.display());
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(&dir.path().join("book-batch.toml")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book-batch.toml");
        fs::write(&path, "max_wokers = 2\n").await.unwrap();

        let err = load_config_file(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::TomlParseFailed { .. })));
    }
}

//! 台账存储 - 基础设施层
//!
//! 只负责"把台账读出来 / 写回去"，不认识状态机，也不关心并发。

use crate::error::{AppError, AppResult, LedgerError};
use crate::models::Task;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

/// 持久化的台账内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

fn default_max_workers() -> usize {
    3
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            max_workers: default_max_workers(),
            updated_at: None,
        }
    }
}

/// 台账存储接口
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 存储位置（用于日志）
    fn location(&self) -> String;

    /// 读取台账；不存在时返回 `None`，内容损坏时返回 `LedgerError::Corrupt`
    async fn load(&self) -> AppResult<Option<LedgerState>>;

    /// 整体写回台账
    async fn save(&self, state: &LedgerState) -> AppResult<()>;
}

/// JSON 文件存储
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> AppResult<Option<LedgerState>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::file_read_failed(self.location(), e)),
        };

        let state = serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
            path: self.location(),
            source,
        })?;
        Ok(Some(state))
    }

    async fn save(&self, state: &LedgerState) -> AppResult<()> {
        let data = serde_json::to_vec_pretty(state).map_err(LedgerError::Serialize)?;

        // 先写临时文件再改名，避免中断时留下半个文件
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|source| LedgerError::PersistFailed {
                path: tmp_path.display().to_string(),
                source,
            })?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| LedgerError::PersistFailed {
                path: self.location(),
                source,
            })?;
        Ok(())
    }
}

/// 内存存储（不落盘，用于测试）
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<LedgerState>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一份已保存的台账
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// 最近一次保存的内容
    pub fn snapshot(&self) -> Option<LedgerState> {
        self.state.lock().map(|s| s.clone()).unwrap_or(None)
    }

    /// 保存次数
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    async fn load(&self) -> AppResult<Option<LedgerState>> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|e| AppError::Other(format!("内存存储锁异常: {}", e)))
    }

    async fn save(&self, state: &LedgerState) -> AppResult<()> {
        let mut slot = self
            .state
            .lock()
            .map_err(|e| AppError::Other(format!("内存存储锁异常: {}", e)))?;
        *slot = Some(state.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

//! 任务台账 - 流程层
//!
//! 记录每个 (节号, 操作) 任务的生命周期，支持中断后恢复。
//!
//! - 所有修改都在同一把锁内完成，并在释放锁前写回存储
//! - 修改先作用于副本，保存成功后才替换内存状态；保存失败时内存与文件保持一致
//! - 状态流转：pending → running → {completed | failed}，failed 可经 resume 回到 running
//! - 台账文件损坏时视为空台账，只打印警告

use crate::config::clamp_workers;
use crate::error::{AppResult, LedgerError};
use crate::infrastructure::{LedgerState, LedgerStore};
use crate::models::{Operation, StatusCounts, Task, TaskStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 任务台账
pub struct TaskLedger {
    store: Arc<dyn LedgerStore>,
    max_workers: usize,
    state: Mutex<LedgerState>,
}

impl TaskLedger {
    /// 创建空台账（不读取存储）
    pub fn new(store: Arc<dyn LedgerStore>, max_workers: usize) -> Self {
        let max_workers = clamp_workers(max_workers);
        Self {
            store,
            max_workers,
            state: Mutex::new(LedgerState {
                max_workers,
                ..Default::default()
            }),
        }
    }

    /// 创建台账并加载已有状态
    pub async fn open(store: Arc<dyn LedgerStore>, max_workers: usize) -> Self {
        let ledger = Self::new(store, max_workers);
        ledger.load_state().await;
        ledger
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 加载台账状态
    ///
    /// 读取或解析失败都不会返回错误，台账重置为空
    pub async fn load_state(&self) {
        let loaded = match self.store.load().await {
            Ok(Some(state)) => state,
            Ok(None) => LedgerState::default(),
            Err(e) => {
                warn!("⚠️ 加载状态文件失败，已重置为空台账: {}", e);
                LedgerState::default()
            }
        };

        debug!(
            "台账已加载: {} 个任务 ({})",
            loaded.tasks.len(),
            self.store.location()
        );

        let mut state = self.state.lock().await;
        *state = LedgerState {
            max_workers: self.max_workers,
            ..loaded
        };
    }

    /// 创建批量任务
    ///
    /// 先清除所有已完成的任务，再为尚无该操作任务的节号追加 pending 任务。
    /// 返回新建的任务数。
    pub async fn create_batch(&self, section_ids: &[String], operation: Operation) -> AppResult<usize> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        next.tasks.retain(|t| t.status != TaskStatus::Completed);

        let mut created = 0;
        for (index, section_id) in section_ids.iter().enumerate() {
            if next.tasks.iter().any(|t| t.matches(section_id, operation)) {
                continue;
            }
            let agent_id = (index % self.max_workers) as u32 + 1;
            next.tasks
                .push(Task::pending(section_id.clone(), operation, agent_id));
            created += 1;
        }

        self.persist(next, &mut state).await?;

        info!(
            "✅ 已创建批量任务: {} {} 个小节 (新增 {})",
            operation,
            section_ids.len(),
            created
        );
        info!(
            "🤖 将启动 {} 个 {} 并行处理",
            self.max_workers,
            operation.agent_type()
        );
        Ok(created)
    }

    /// 更新任务状态
    ///
    /// 找不到任务时静默返回 `Ok(false)`；违反状态机时返回 `InvalidTransition`，任务保持不变。
    pub async fn update_status(
        &self,
        section_id: &str,
        operation: Operation,
        status: TaskStatus,
        error_msg: Option<&str>,
        output: Option<&str>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        let Some(task) = next
            .tasks
            .iter_mut()
            .find(|t| t.matches(section_id, operation))
        else {
            debug!("未找到任务 {} ({})，忽略状态更新", section_id, operation);
            return Ok(false);
        };

        if !task.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                section_id: section_id.to_string(),
                operation,
                from: task.status,
                to: status,
            }
            .into());
        }

        let now = chrono::Local::now().naive_local();
        task.status = status;
        match status {
            TaskStatus::Running => task.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed => task.completed_at = Some(now),
            TaskStatus::Pending => {}
        }
        if let Some(msg) = error_msg {
            task.error_msg = Some(msg.to_string());
        }
        if let Some(out) = output {
            task.output = Some(out.to_string());
        }

        self.persist(next, &mut state).await?;
        Ok(true)
    }

    pub async fn mark_running(&self, section_id: &str, operation: Operation) -> AppResult<bool> {
        self.update_status(section_id, operation, TaskStatus::Running, None, None)
            .await
    }

    pub async fn mark_completed(
        &self,
        section_id: &str,
        operation: Operation,
        output: &str,
    ) -> AppResult<bool> {
        self.update_status(section_id, operation, TaskStatus::Completed, None, Some(output))
            .await
    }

    pub async fn mark_failed(
        &self,
        section_id: &str,
        operation: Operation,
        error_msg: &str,
    ) -> AppResult<bool> {
        self.update_status(section_id, operation, TaskStatus::Failed, Some(error_msg), None)
            .await
    }

    /// 各状态任务数量（读取时刻的快照）
    pub async fn get_status(&self) -> StatusCounts {
        let state = self.state.lock().await;
        StatusCounts::from_tasks(&state.tasks)
    }

    /// 所有任务的快照
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    /// 可恢复的任务（pending 或 failed），保持台账顺序
    pub async fn resumable(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .filter(|t| t.status.is_resumable())
            .cloned()
            .collect()
    }

    /// 台账为任务分配的 Agent 编号
    pub async fn assigned_worker(&self, section_id: &str, operation: Operation) -> Option<u32> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .find(|t| t.matches(section_id, operation))
            .map(|t| t.agent_id)
    }

    /// 保存 `next`，成功后才替换 `current`
    async fn persist(&self, mut next: LedgerState, current: &mut LedgerState) -> AppResult<()> {
        next.max_workers = self.max_workers;
        next.updated_at = Some(chrono::Local::now().naive_local());
        self.store.save(&next).await?;
        *current = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::{JsonFileStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 前 `ok_saves` 次保存成功，之后全部失败
    struct BrokenDiskStore {
        inner: MemoryStore,
        ok_saves: usize,
        attempts: AtomicUsize,
    }

    impl BrokenDiskStore {
        fn new(ok_saves: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                ok_saves,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for BrokenDiskStore {
        fn location(&self) -> String {
            "<broken disk>".to_string()
        }

        async fn load(&self) -> AppResult<Option<LedgerState>> {
            self.inner.load().await
        }

        async fn save(&self, state: &LedgerState) -> AppResult<()> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) >= self.ok_saves {
                return Err(LedgerError::PersistFailed {
                    path: self.location(),
                    source: std::io::Error::other("disk full"),
                }
                .into());
            }
            self.inner.save(state).await
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn memory_ledger(workers: usize) -> (Arc<MemoryStore>, TaskLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = TaskLedger::new(store.clone(), workers);
        (store, ledger)
    }

    #[tokio::test]
    async fn test_create_batch_adds_pending_tasks_round_robin() {
        let (store, ledger) = memory_ledger(2);
        let created = ledger
            .create_batch(&ids(&["1.1", "1.2", "1.3"]), Operation::Research)
            .await
            .unwrap();
        assert_eq!(created, 3);

        let tasks = ledger.tasks().await;
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        let workers: Vec<u32> = tasks.iter().map(|t| t.agent_id).collect();
        assert_eq!(workers, vec![1, 2, 1]);

        // 写穿：创建后立即保存
        assert_eq!(store.snapshot().unwrap().tasks.len(), 3);
    }

    #[tokio::test]
    async fn test_create_batch_is_idempotent() {
        let (_store, ledger) = memory_ledger(3);
        let sections = ids(&["2.1", "2.2"]);
        ledger.create_batch(&sections, Operation::Write).await.unwrap();
        let first = ledger.tasks().await;

        let created = ledger.create_batch(&sections, Operation::Write).await.unwrap();
        assert_eq!(created, 0);
        assert_eq!(ledger.tasks().await, first);
    }

    #[tokio::test]
    async fn test_create_batch_collapses_duplicate_ids() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["2.1", "2.1"]), Operation::Write)
            .await
            .unwrap();
        assert_eq!(ledger.get_status().await.total, 1);
    }

    #[tokio::test]
    async fn test_existing_unfinished_task_is_left_unchanged() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["1.1"]), Operation::Review)
            .await
            .unwrap();
        ledger.mark_running("1.1", Operation::Review).await.unwrap();
        ledger
            .mark_failed("1.1", Operation::Review, "未找到小节文件: 1.1")
            .await
            .unwrap();

        ledger
            .create_batch(&ids(&["1.1", "1.2"]), Operation::Review)
            .await
            .unwrap();

        let tasks = ledger.tasks().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].error_msg.as_deref(), Some("未找到小节文件: 1.1"));
        assert_eq!(tasks[1].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_new_batch_purges_completed_tasks_of_any_operation() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["1.1", "1.2"]), Operation::Research)
            .await
            .unwrap();
        ledger.mark_running("1.1", Operation::Research).await.unwrap();
        ledger
            .mark_completed("1.1", Operation::Research, "ok")
            .await
            .unwrap();

        ledger
            .create_batch(&ids(&["1.1"]), Operation::Write)
            .await
            .unwrap();

        let tasks = ledger.tasks().await;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert!(tasks
            .iter()
            .any(|t| t.matches("1.2", Operation::Research)));
        assert!(tasks.iter().any(|t| t.matches("1.1", Operation::Write)));
    }

    #[tokio::test]
    async fn test_update_status_sets_timestamps_and_output() {
        let (store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["4.1"]), Operation::Proofread)
            .await
            .unwrap();
        let saves_before = store.save_count();

        assert!(ledger.mark_running("4.1", Operation::Proofread).await.unwrap());
        assert!(ledger
            .mark_completed("4.1", Operation::Proofread, "校对完成")
            .await
            .unwrap());

        let task = &ledger.tasks().await[0];
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        assert_eq!(task.output.as_deref(), Some("校对完成"));
        assert!(task.error_msg.is_none());
        assert_eq!(store.save_count(), saves_before + 2);
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_silent_noop() {
        let (store, ledger) = memory_ledger(3);
        let updated = ledger.mark_running("9.9", Operation::Write).await.unwrap();
        assert!(!updated);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_cannot_jump_to_completed() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["1.1"]), Operation::Write)
            .await
            .unwrap();

        let err = ledger
            .mark_completed("1.1", Operation::Write, "done")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
                ..
            })
        ));
        assert_eq!(ledger.tasks().await[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_task_can_run_again() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["1.1"]), Operation::Write)
            .await
            .unwrap();
        ledger.mark_running("1.1", Operation::Write).await.unwrap();
        ledger.mark_failed("1.1", Operation::Write, "boom").await.unwrap();

        assert!(ledger.mark_running("1.1", Operation::Write).await.unwrap());
        assert_eq!(ledger.resumable().await.len(), 0);
    }

    #[tokio::test]
    async fn test_status_counts_sum_to_total() {
        let (_store, ledger) = memory_ledger(3);
        ledger
            .create_batch(&ids(&["1.1", "1.2", "1.3", "1.4"]), Operation::Research)
            .await
            .unwrap();
        ledger.mark_running("1.1", Operation::Research).await.unwrap();
        ledger.mark_running("1.2", Operation::Research).await.unwrap();
        ledger
            .mark_failed("1.2", Operation::Research, "x")
            .await
            .unwrap();

        let counts = ledger.get_status().await;
        assert_eq!(counts.total, 4);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.running, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(
            counts.pending + counts.running + counts.completed + counts.failed,
            counts.total
        );
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_matching_disk() {
        let store = Arc::new(BrokenDiskStore::new(1));
        let ledger = TaskLedger::new(store.clone(), 3);
        ledger
            .create_batch(&ids(&["1.1"]), Operation::Write)
            .await
            .unwrap();

        let err = ledger.mark_running("1.1", Operation::Write).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::PersistFailed { .. })
        ));
        assert_eq!(ledger.tasks().await[0].status, TaskStatus::Pending);

        assert!(ledger
            .create_batch(&ids(&["1.2"]), Operation::Write)
            .await
            .is_err());
        assert_eq!(ledger.get_status().await.total, 1);

        let saved = store.inner.snapshot().unwrap();
        assert_eq!(saved.tasks, ledger.tasks().await);
    }

    #[tokio::test]
    async fn test_open_loads_saved_tasks() {
        let mut failed = Task::pending("6.1", Operation::Review, 2);
        failed.status = TaskStatus::Failed;
        let state = LedgerState {
            tasks: vec![Task::pending("6.2", Operation::Write, 1), failed],
            max_workers: 5,
            updated_at: None,
        };

        let ledger = TaskLedger::open(Arc::new(MemoryStore::with_state(state)), 2).await;
        assert_eq!(ledger.max_workers(), 2);
        let resumable: Vec<String> = ledger
            .resumable()
            .await
            .into_iter()
            .map(|t| t.section_id)
            .collect();
        assert_eq!(resumable, ids(&["6.2", "6.1"]));
    }

    #[tokio::test]
    async fn test_corrupt_state_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".batch_state.json");
        tokio::fs::write(&path, "{\"tasks\": [oops").await.unwrap();

        let ledger = TaskLedger::open(Arc::new(JsonFileStore::new(&path)), 3).await;
        assert_eq!(ledger.get_status().await.total, 0);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".batch_state.json");

        let ledger = TaskLedger::open(Arc::new(JsonFileStore::new(&path)), 2).await;
        ledger
            .create_batch(&ids(&["5.1", "5.2"]), Operation::Review)
            .await
            .unwrap();
        ledger.mark_running("5.1", Operation::Review).await.unwrap();

        let reopened = TaskLedger::open(Arc::new(JsonFileStore::new(&path)), 4).await;
        let counts = reopened.get_status().await;
        assert_eq!(counts.total, 2);
        assert_eq!(counts.running, 1);
        assert_eq!(reopened.max_workers(), 4);
        assert_eq!(
            reopened.assigned_worker("5.2", Operation::Review).await,
            Some(2)
        );
    }
}

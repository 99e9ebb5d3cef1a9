use async_trait::async_trait;
use book_batch::error::{AppError, AppResult, ConfigError, SectionError};
use book_batch::infrastructure::{JsonFileStore, LedgerState};
use book_batch::models::{FrontMatter, Operation, Task, TaskStatus};
use book_batch::services::{
    AgentContext, ContentGenerator, GenerationRequest, GenerationResponse, SectionRepository,
    StubGenerator,
};
use book_batch::{App, Config, Dispatcher, TaskLedger};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_test::assert_ok;

const SKILL_DIR: &str = ".claude/skills/book-writer";

fn test_config() -> Config {
    Config {
        simulated_delay_ms: 0,
        task_timeout_secs: 5,
        ..Config::default()
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    fs::write(path, content).await.unwrap();
}

/// 一本只有一节的书，带研究主题和纲要
async fn sample_book() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(
        &root.join("第一部分/1.1_为什么需要智能体.md"),
        "---\nsection_id: \"1.1\"\ntitle: 为什么需要智能体\nstatus: outline\nword_count: 0\ntarget_words: 3000\nreviewer: 李四\n---\n\n# 为什么需要智能体\n\n（待撰写）\n",
    )
    .await;
    write_file(
        &root.join(SKILL_DIR).join("references/research-topics.md"),
        "# 研究主题\n\n## 1.1 为什么需要智能体\n- 智能体的定义\n- 与工作流的区别\n\n## 1.2 核心框架\n- 感知与行动\n",
    )
    .await;
    write_file(
        &root.join(SKILL_DIR).join("references/outline.md"),
        "# 纲要\n\n1.1 为什么需要智能体\n  - 从一个失败的自动化脚本讲起\n1.2 核心框架\n  - 感知、决策、行动\n",
    )
    .await;

    dir
}

async fn front_matter_of(app: &App, section_id: &str) -> FrontMatter {
    let repo = SectionRepository::new(app.book_dir(), SKILL_DIR);
    let path = repo.require(section_id).await.unwrap();
    repo.read_front_matter(&path).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_full_pipeline_moves_section_through_every_status() {
    let dir = sample_book().await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();
    let sections = ids(&["1.1"]);

    let report = assert_ok!(app.run_batch(&sections, Operation::Research).await);
    assert!(report.all_succeeded());
    assert_eq!(front_matter_of(&app, "1.1").await.status.as_deref(), Some("researched"));

    let note = fs::read_to_string(
        dir.path()
            .join(SKILL_DIR)
            .join("assets/research/1.1_research.md"),
    )
    .await
    .unwrap();
    assert!(note.contains("- 智能体的定义"));
    assert!(!note.contains("感知与行动"));

    assert_ok!(app.run_batch(&sections, Operation::Write).await);
    let front = front_matter_of(&app, "1.1").await;
    assert_eq!(front.status.as_deref(), Some("draft"));
    assert!(front.word_count.unwrap() > 0);
    assert_eq!(
        front.extra.get("reviewer").and_then(|v| v.as_str()),
        Some("李四")
    );

    let tasks = app.ledger().tasks().await;
    let write_task = tasks
        .iter()
        .find(|t| t.operation == Operation::Write)
        .unwrap();
    assert_eq!(
        write_task.output.as_deref(),
        Some(format!("已撰写 {} 字", front.word_count.unwrap()).as_str())
    );

    assert_ok!(app.run_batch(&sections, Operation::Review).await);
    assert_eq!(front_matter_of(&app, "1.1").await.status.as_deref(), Some("reviewed"));
    assert!(dir
        .path()
        .join(SKILL_DIR)
        .join("assets/review/1.1_review.md")
        .exists());

    assert_ok!(app.run_batch(&sections, Operation::Proofread).await);
    assert_eq!(front_matter_of(&app, "1.1").await.status.as_deref(), Some("final"));

    let progress = app.progress().await.unwrap();
    assert_eq!(progress.total_sections, 1);
    assert_eq!(progress.completed_sections, 1);
    assert!(dir.path().join("progress.json").exists());
}

#[tokio::test]
async fn test_resume_completes_pending_and_failed_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join(".batch_state.json");

    let mut tasks: Vec<Task> = ["3.1", "3.2", "3.3"]
        .iter()
        .enumerate()
        .map(|(i, id)| Task::pending(*id, Operation::Write, i as u32 + 1))
        .collect();
    for (i, id) in ["3.4", "3.5"].iter().enumerate() {
        let mut task = Task::pending(*id, Operation::Write, i as u32 + 1);
        task.status = TaskStatus::Failed;
        task.error_msg = Some("上次运行失败".to_string());
        tasks.push(task);
    }
    let state = LedgerState {
        tasks,
        ..LedgerState::default()
    };
    fs::write(&state_path, serde_json::to_string_pretty(&state).unwrap())
        .await
        .unwrap();

    let app = App::initialize(dir.path(), test_config()).await.unwrap();
    let reports = app.resume().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].operation, Operation::Write);
    assert_eq!(reports[0].total, 5);
    assert_eq!(reports[0].succeeded.len(), 5);

    let counts = app.ledger().get_status().await;
    assert_eq!(counts.completed, 5);
    assert_eq!(counts.pending + counts.failed, 0);

    // 台账已写回文件
    let saved: LedgerState =
        serde_json::from_str(&fs::read_to_string(&state_path).await.unwrap()).unwrap();
    assert!(saved
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed && t.completed_at.is_some()));

    // 再次恢复没有任务
    assert!(app.resume().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_runs_operations_in_pipeline_order() {
    let dir = sample_book().await;

    let store = JsonFileStore::new(dir.path().join(".batch_state.json"));
    let ledger = TaskLedger::new(Arc::new(store), 3);
    ledger
        .create_batch(&ids(&["1.1"]), Operation::Proofread)
        .await
        .unwrap();
    ledger
        .create_batch(&ids(&["1.1"]), Operation::Research)
        .await
        .unwrap();

    let app = App::initialize(dir.path(), test_config()).await.unwrap();
    let reports = app.resume().await.unwrap();
    let order: Vec<Operation> = reports.iter().map(|r| r.operation).collect();
    assert_eq!(order, vec![Operation::Research, Operation::Proofread]);
    assert_eq!(front_matter_of(&app, "1.1").await.status.as_deref(), Some("final"));
}

#[tokio::test]
async fn test_missing_section_fails_without_affecting_siblings() {
    let dir = sample_book().await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();

    let report = app
        .run_batch(&ids(&["1.1", "7.7"]), Operation::Proofread)
        .await
        .unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, ids(&["1.1"]));
    assert_eq!(report.failed, ids(&["7.7"]));

    let counts = app.status().await;
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(
        counts.pending + counts.running + counts.completed + counts.failed,
        counts.total
    );
}

#[tokio::test]
async fn test_new_batch_keeps_failed_and_purges_completed() {
    let dir = sample_book().await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();

    app.run_batch(&ids(&["1.1", "7.7"]), Operation::Review)
        .await
        .unwrap();
    app.run_batch(&ids(&["1.1"]), Operation::Proofread)
        .await
        .unwrap();

    let tasks = app.ledger().tasks().await;
    // review 1.1 已完成被清除；review 7.7 失败保留；proofread 1.1 完成
    assert_eq!(tasks.len(), 2);
    assert!(tasks
        .iter()
        .any(|t| t.section_id == "7.7" && t.status == TaskStatus::Failed));
    assert!(tasks
        .iter()
        .any(|t| t.operation == Operation::Proofread && t.status == TaskStatus::Completed));
}

/// 指定节号时卡住或 panic 的生成器
struct FaultyGenerator {
    slow: &'static str,
    panics: &'static str,
    inner: StubGenerator,
}

#[async_trait]
impl ContentGenerator for FaultyGenerator {
    async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationResponse> {
        if request.section_id == self.slow {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if request.section_id == self.panics {
            panic!("generator exploded on {}", request.section_id);
        }
        self.inner.generate(request).await
    }
}

#[tokio::test]
async fn test_timeout_and_panic_are_recorded_as_failures() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(TaskLedger::new(
        Arc::new(JsonFileStore::new(dir.path().join(".batch_state.json"))),
        3,
    ));
    let ctx = AgentContext::new(
        Arc::new(SectionRepository::new(dir.path(), SKILL_DIR)),
        Arc::new(FaultyGenerator {
            slow: "1.2",
            panics: "1.3",
            inner: StubGenerator::new(Duration::ZERO),
        }),
    );
    let dispatcher = Dispatcher::new(ledger.clone(), ctx, 3, Duration::from_millis(200));

    let report = dispatcher
        .run_parallel(&ids(&["1.1", "1.2", "1.3"]), Operation::Research)
        .await
        .unwrap();

    assert_eq!(report.succeeded, ids(&["1.1"]));
    let mut failed = report.failed.clone();
    failed.sort();
    assert_eq!(failed, ids(&["1.2", "1.3"]));

    let tasks = ledger.tasks().await;
    let by_id = |id: &str| tasks.iter().find(|t| t.section_id == id).unwrap().clone();
    assert_eq!(by_id("1.1").status, TaskStatus::Completed);
    assert_eq!(by_id("1.2").status, TaskStatus::Failed);
    assert!(by_id("1.2").error_msg.unwrap().starts_with("任务超时"));
    assert_eq!(by_id("1.3").status, TaskStatus::Failed);
    assert!(by_id("1.3").error_msg.unwrap().contains("任务异常退出"));
}

#[tokio::test]
async fn test_parallel_override_wins_over_persisted_workers() {
    let dir = tempfile::tempdir().unwrap();
    let state = LedgerState {
        max_workers: 5,
        ..LedgerState::default()
    };
    fs::write(
        dir.path().join(".batch_state.json"),
        serde_json::to_string(&state).unwrap(),
    )
    .await
    .unwrap();

    let config = test_config().with_parallel(Some(2));
    let app = App::initialize(dir.path(), config).await.unwrap();
    assert_eq!(app.ledger().max_workers(), 2);

    app.run_batch(&ids(&["1.1", "1.2", "1.3"]), Operation::Research)
        .await
        .unwrap();
    let agents: Vec<u32> = app.ledger().tasks().await.iter().map(|t| t.agent_id).collect();
    assert_eq!(agents, vec![1, 2, 1]);
}

#[tokio::test]
async fn test_corrupt_state_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".batch_state.json"), "not json at all")
        .await
        .unwrap();

    let app = App::initialize(dir.path(), test_config()).await.unwrap();
    assert_eq!(app.status().await.total, 0);
}

#[tokio::test]
async fn test_single_agent_reports_missing_section() {
    let dir = sample_book().await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();

    let err = app.run_single(Operation::Review, "9.9").await.unwrap_err();
    assert!(matches!(err, AppError::Section(SectionError::NotFound { .. })));

    let output = app.run_single(Operation::Review, "1.1").await.unwrap();
    assert_eq!(output.summary, "审查报告已生成");
    // 单节执行不写台账
    assert_eq!(app.ledger().get_status().await.total, 0);
}

#[tokio::test]
async fn test_missing_book_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = App::initialize(dir.path().join("不存在"), test_config()).await;
    assert!(matches!(
        result,
        Err(AppError::Config(ConfigError::BookDirNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_proofread_keeps_status_when_forbidden_words_remain() {
    let dir = sample_book().await;
    write_file(
        &dir.path().join("第一部分/1.2_核心框架.md"),
        "---\nsection_id: \"1.2\"\ntitle: 核心框架\nstatus: reviewed\ntarget_words: 3000\n---\n\n# 核心框架\n\n综上所述，我们需要 Agent 与 agent 统一。\n",
    )
    .await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();

    let report = app
        .run_batch(&ids(&["1.1", "1.2"]), Operation::Proofread)
        .await
        .unwrap();
    // 有严重问题仍算任务完成，只是不定稿
    assert!(report.all_succeeded());

    assert_eq!(front_matter_of(&app, "1.1").await.status.as_deref(), Some("final"));
    assert_eq!(front_matter_of(&app, "1.2").await.status.as_deref(), Some("reviewed"));

    let edit = fs::read_to_string(dir.path().join(SKILL_DIR).join("assets/edit/1.2_edit.md"))
        .await
        .unwrap();
    assert!(edit.contains("- 严重问题: 2"));
    assert!(edit.contains("'agent' 应统一为 'Agent'") || edit.contains("'Agent' 应统一为 'agent'"));
    assert!(edit.contains("❌ **需要修改**"));

    let tasks = app.ledger().tasks().await;
    let output = |id: &str| {
        tasks
            .iter()
            .find(|t| t.section_id == id)
            .and_then(|t| t.output.clone())
            .unwrap()
    };
    assert!(output("1.1").starts_with("校对完成"));
    assert_eq!(output("1.2"), "校对发现严重问题 (严重=2, 警告=1, 建议=1)");
}

#[tokio::test]
async fn test_validate_reports_each_section() {
    let dir = sample_book().await;
    write_file(
        &dir.path().join("第一部分/1.2_核心框架.md"),
        "---\nsection_id: \"1.2\"\nstatus: draft\ntarget_words: 3000\n---\n\n众所周知。\n",
    )
    .await;
    let app = App::initialize(dir.path(), test_config()).await.unwrap();

    let report = app.validate(None).await.unwrap();
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.passed(), 1);
    // 缺 title、字数严重不足、禁忌表达
    assert_eq!(report.warnings(), 3);
    assert_eq!(report.errors(), 0);

    let single = app.validate(Some("1.1")).await.unwrap();
    assert_eq!(single.files.len(), 1);
    assert!(!single.files[0].has_problems());

    assert!(matches!(
        app.validate(Some("8.8")).await.unwrap_err(),
        AppError::Section(SectionError::NotFound { .. })
    ));
}

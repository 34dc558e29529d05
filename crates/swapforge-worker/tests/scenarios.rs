//! End-to-end scenarios. Each test drives the same collaborators an RPC
//! facade would (credit ledger, task store, queue, worker), without routing
//! through an actual HTTP/JSON-RPC layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use swapforge_billing::{apply_whitelist_on_login, check_and_debit, refund_if_not_refunded, DebitOutcome, WhitelistPolicy};
use swapforge_core::error::ForgeError;
use swapforge_core::types::{EditMode, TaskId, TaskStatus, UserId};
use swapforge_pipeline::{Pipeline, PipelineDispatch, PipelineInput};
use swapforge_store::{ForgeDb, Task, TaskResult, User};
use swapforge_worker::{run_once, PollOutcome, WorkerConfig, WorkerDeps};

fn open_db() -> Arc<ForgeDb> {
    let dir = tempfile::tempdir().unwrap();
    Arc::new(ForgeDb::open(dir.path()).unwrap())
}

struct ScriptedPipeline {
    mode: EditMode,
    outcome: Mutex<Option<Result<TaskResult, ForgeError>>>,
}

#[async_trait]
impl Pipeline for ScriptedPipeline {
    fn mode(&self) -> EditMode {
        self.mode
    }

    async fn execute(&self, _input: PipelineInput) -> Result<TaskResult, ForgeError> {
        self.outcome.lock().unwrap().take().expect("pipeline invoked more than once")
    }
}

struct SingleModeDispatch {
    mode: EditMode,
    pipeline: Arc<dyn Pipeline>,
}

impl PipelineDispatch for SingleModeDispatch {
    fn dispatch(&self, mode: EditMode) -> Arc<dyn Pipeline> {
        assert_eq!(mode, self.mode, "test dispatch only wired one mode");
        self.pipeline.clone()
    }
}

fn deps_with(db: &Arc<ForgeDb>, mode: EditMode, outcome: Result<TaskResult, ForgeError>) -> WorkerDeps {
    let pipeline = Arc::new(ScriptedPipeline { mode, outcome: Mutex::new(Some(outcome)) });
    WorkerDeps {
        relational: db.clone(),
        kv: db.clone(),
        pipelines: Arc::new(SingleModeDispatch { mode, pipeline }),
    }
}

fn sample_output() -> TaskResult {
    TaskResult {
        output_image: "obj_output_1".to_string(),
        thumbnail: "obj_thumb_1".to_string(),
        comparison_image: None,
        metadata: serde_json::json!({"width": 512, "height": 512}),
    }
}

/// Scenario 1 — happy path: a 100-credit user submits a HEAD_SWAP task at
/// standard/medium (cost 48); the worker completes it and the result is
/// visible with a non-empty output handle.
#[tokio::test]
async fn scenario_1_happy_path() {
    let db = open_db();
    let mut user = User::new("u1@x.com".to_string(), 0);
    user.current_credits = 100;
    db.put_user(&user).unwrap();

    let outcome = check_and_debit(&*db, &user.user_id, 48).unwrap();
    assert_eq!(outcome, DebitOutcome::Ok);

    let task = Task {
        task_id: TaskId::generate(1),
        user_id: user.user_id.clone(),
        mode: EditMode::HeadSwap,
        status: TaskStatus::Pending,
        progress: 0,
        current_step: "queued".to_string(),
        source_image: "img_s".to_string(),
        reference_image: "img_r".to_string(),
        config: serde_json::json!({"reference_image": "img_r", "quality": "standard", "size": "medium"}),
        credits_consumed: 48,
        result: None,
        error: None,
        refunded: false,
        created_at: 1,
        updated_at: 1,
        completed_at: None,
        failed_at: None,
        processing_time: None,
    };
    db.insert_task(&task).unwrap();
    swapforge_queue::push(&*db, &task.task_id).unwrap();

    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 52);

    let deps = deps_with(&db, EditMode::HeadSwap, Ok(sample_output()));
    let result = run_once(&deps, &WorkerConfig { pop_timeout: Duration::from_millis(200) }).await.unwrap();
    assert_eq!(result, PollOutcome::Processed(task.task_id.clone()));

    let reloaded = db.get_task(&task.task_id).unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Done);
    assert!(!reloaded.result.as_ref().unwrap().output_image.is_empty());
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 52);
}

/// Scenario 2 — insufficient credits: a 10-credit user is charged for a
/// 48-credit task; the debit is rejected, the balance is untouched, and no
/// task row is ever created.
#[tokio::test]
async fn scenario_2_insufficient_credits() {
    let db = open_db();
    let mut user = User::new("u2@x.com".to_string(), 0);
    user.current_credits = 10;
    db.put_user(&user).unwrap();

    let outcome = check_and_debit(&*db, &user.user_id, 48).unwrap();
    assert_eq!(
        outcome,
        DebitOutcome::Insufficient { required: 48, current: 10, deficit: 38 }
    );
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 10);
}

/// Scenario 3 — engine timeout: the pipeline reports `ENGINE_TIMEOUT`; the
/// task ends `failed` and the reserved credits are returned in full.
#[tokio::test]
async fn scenario_3_engine_timeout_refunds() {
    let db = open_db();
    let mut user = User::new("u3@x.com".to_string(), 0);
    user.current_credits = 100;
    db.put_user(&user).unwrap();
    check_and_debit(&*db, &user.user_id, 50).unwrap();

    let task = Task {
        task_id: TaskId::generate(2),
        user_id: user.user_id.clone(),
        mode: EditMode::PoseChange,
        status: TaskStatus::Pending,
        progress: 0,
        current_step: "queued".to_string(),
        source_image: "img_s".to_string(),
        reference_image: "img_r".to_string(),
        config: serde_json::json!({"pose_reference": "img_r"}),
        credits_consumed: 50,
        result: None,
        error: None,
        refunded: false,
        created_at: 1,
        updated_at: 1,
        completed_at: None,
        failed_at: None,
        processing_time: None,
    };
    db.insert_task(&task).unwrap();
    swapforge_queue::push(&*db, &task.task_id).unwrap();

    let deps = deps_with(&db, EditMode::PoseChange, Err(ForgeError::EngineTimeout { elapsed_secs: 300 }));
    run_once(&deps, &WorkerConfig { pop_timeout: Duration::from_millis(200) }).await.unwrap();

    let reloaded = db.get_task(&task.task_id).unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Failed);
    assert_eq!(reloaded.error.as_ref().unwrap().code, "ENGINE_TIMEOUT");
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 100);
}

/// Scenario 4 — cross-user access: U owns task T; V is not T's owner and
/// must be rejected before touching T's state. Mirrors the ownership check
/// an RPC `get_task` handler performs ahead of this core.
#[tokio::test]
async fn scenario_4_cross_user_access_is_forbidden() {
    let db = open_db();
    let owner = UserId::generate();
    let intruder = UserId::generate();

    let task = Task {
        task_id: TaskId::generate(3),
        user_id: owner.clone(),
        mode: EditMode::BackgroundChange,
        status: TaskStatus::Done,
        progress: 100,
        current_step: "done".to_string(),
        source_image: "img_s".to_string(),
        reference_image: "img_r".to_string(),
        config: serde_json::json!({}),
        credits_consumed: 30,
        result: Some(sample_output()),
        error: None,
        refunded: false,
        created_at: 1,
        updated_at: 1,
        completed_at: Some(1),
        failed_at: None,
        processing_time: Some(5),
    };
    db.insert_task(&task).unwrap();

    fn get_task_as(db: &ForgeDb, task_id: &TaskId, requester: &UserId) -> Result<Task, ForgeError> {
        let task = db
            .get_task(task_id)?
            .ok_or_else(|| ForgeError::TaskNotFound(task_id.to_string()))?;
        if task.user_id != *requester {
            return Err(ForgeError::Forbidden);
        }
        Ok(task)
    }

    let result = get_task_as(&db, &task.task_id, &intruder);
    assert!(matches!(result, Err(ForgeError::Forbidden)));

    let unchanged = db.get_task(&task.task_id).unwrap().unwrap();
    assert_eq!(unchanged.status, TaskStatus::Done);
}

/// Scenario 5 — double-cancel: the first cancel succeeds and refunds once;
/// the second is rejected as a terminal-state transition and applies no
/// second refund.
#[tokio::test]
async fn scenario_5_double_cancel_refunds_exactly_once() {
    let db = open_db();
    let mut user = User::new("u5@x.com".to_string(), 0);
    user.current_credits = 100;
    db.put_user(&user).unwrap();
    check_and_debit(&*db, &user.user_id, 48).unwrap();

    let task = Task {
        task_id: TaskId::generate(4),
        user_id: user.user_id.clone(),
        mode: EditMode::HeadSwap,
        status: TaskStatus::Pending,
        progress: 0,
        current_step: "queued".to_string(),
        source_image: "img_s".to_string(),
        reference_image: "img_r".to_string(),
        config: serde_json::json!({}),
        credits_consumed: 48,
        result: None,
        error: None,
        refunded: false,
        created_at: 1,
        updated_at: 1,
        completed_at: None,
        failed_at: None,
        processing_time: None,
    };
    db.insert_task(&task).unwrap();

    // Mirrors the cancel_task RPC handler: transition to cancelled, then
    // refund if that transition actually applied.
    fn cancel(db: &ForgeDb, task_id: &TaskId, now: i64) -> Result<(), ForgeError> {
        let applied = db.update_status(task_id, TaskStatus::Cancelled, None, Some("cancelled".to_string()), None, None, None, now)?;
        if !applied {
            return Err(ForgeError::TerminalStateTransition);
        }
        let task = db.get_task(task_id)?.unwrap();
        refund_if_not_refunded(db, &task, now)
    }

    cancel(&db, &task.task_id, 10).unwrap();
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 100);

    let second = cancel(&db, &task.task_id, 20);
    assert!(matches!(second, Err(ForgeError::TerminalStateTransition)));
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 100);
}

/// Scenario 6 — whitelist top-up: a trial-whitelisted user's balance is
/// floored to 1000 on first login; a second login within the same window
/// does not push it past the floor.
#[tokio::test]
async fn scenario_6_whitelist_top_up_is_idempotent() {
    let db = open_db();
    let mut user = User::new("trial@x.com".to_string(), 0);
    user.current_credits = 200;
    db.put_user(&user).unwrap();

    struct TrialWhitelist;
    impl WhitelistPolicy for TrialWhitelist {
        fn floor_credits(&self, email: &str) -> Option<i64> {
            (email == "trial@x.com").then_some(1000)
        }
    }

    apply_whitelist_on_login(&*db, &TrialWhitelist, &user.user_id, "trial@x.com").unwrap();
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 1000);

    apply_whitelist_on_login(&*db, &TrialWhitelist, &user.user_id, "trial@x.com").unwrap();
    assert_eq!(db.get_user(&user.user_id).unwrap().unwrap().current_credits, 1000);
}

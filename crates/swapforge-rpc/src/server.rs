use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use swapforge_billing::DebitOutcome;
use swapforge_core::constants::calculate_task_credits;
use swapforge_core::error::ForgeError;
use swapforge_core::types::{EditMode, Quality, Size, TaskId, TaskStatus};
use swapforge_store::kv_store::KvStore;
use swapforge_store::relational_store::RelationalStore;
use swapforge_store::Task;

use crate::api::SwapForgeApiServer;
use crate::identity::Identity;
use crate::types::{RpcCancelResult, RpcTaskInfo, RpcTaskPage};

fn forge_err_to_rpc(err: ForgeError) -> ErrorObject<'static> {
    let (code, status) = match &err {
        ForgeError::CreditNotEnough { .. } => (-32001, 402),
        ForgeError::Unauthenticated => (-32003, 401),
        ForgeError::Forbidden => (-32002, 403),
        ForgeError::TaskNotFound(_) | ForgeError::UserNotFound(_) => (-32004, 404),
        ForgeError::TerminalStateTransition
        | ForgeError::InvalidMode(_)
        | ForgeError::InvalidRequest(_)
        | ForgeError::InvalidSourceImage(_)
        | ForgeError::MissingReferenceImage(_) => (-32005, 400),
        _ => (-32000, 500),
    };

    let mut data = json!({ "status": status, "code": err.code() });
    if let ForgeError::CreditNotEnough { required, current, deficit } = &err {
        data["required"] = json!(required);
        data["current"] = json!(current);
        data["deficit"] = json!(deficit);
    }
    ErrorObject::owned(code, err.to_string(), Some(data))
}

fn parse_status(s: &str) -> Result<TaskStatus, ForgeError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "processing" => Ok(TaskStatus::Processing),
        "done" => Ok(TaskStatus::Done),
        "failed" => Ok(TaskStatus::Failed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(ForgeError::InvalidRequest(format!("unknown status: {other}"))),
    }
}

/// Resolves the mode-specific reference-image field via the same alias
/// precedence the pipeline layer parses config with, so the two never drift.
fn extract_reference_image(mode: EditMode, config: &Value) -> Option<String> {
    match mode {
        EditMode::HeadSwap => swapforge_pipeline::config::HeadSwapConfig::parse(config).reference_image,
        EditMode::BackgroundChange => {
            swapforge_pipeline::config::BackgroundChangeConfig::parse(config).background_image
        }
        EditMode::PoseChange => swapforge_pipeline::config::PoseChangeConfig::parse(config).pose_reference,
    }
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub relational: Arc<dyn RelationalStore>,
    pub kv: Arc<dyn KvStore>,
    pub identity: Arc<dyn Identity>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl SwapForgeApiServer for RpcServer {
    async fn create_task(
        &self,
        token: String,
        mode: String,
        source_image: String,
        config: Value,
    ) -> RpcResult<RpcTaskInfo> {
        let user_id = self.state.identity.resolve(&token).map_err(forge_err_to_rpc)?;
        let edit_mode: EditMode = mode.parse().map_err(forge_err_to_rpc)?;

        if source_image.trim().is_empty() {
            return Err(forge_err_to_rpc(ForgeError::InvalidSourceImage(source_image)).into());
        }

        let reference_image = extract_reference_image(edit_mode, &config)
            .ok_or_else(|| forge_err_to_rpc(ForgeError::MissingReferenceImage(mode.clone())))?;

        let quality: Quality = config
            .get("quality")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let size: Size = config
            .get("size")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let cost = calculate_task_credits(edit_mode, quality, size);

        match check_and_debit_rpc(&*self.state.relational, &user_id, cost)? {
            DebitOutcome::Insufficient { required, current, deficit } => {
                return Err(forge_err_to_rpc(ForgeError::CreditNotEnough { required, current, deficit }).into());
            }
            DebitOutcome::Ok => {}
        }

        let now = chrono::Utc::now().timestamp();
        let task_id = TaskId::generate(now);
        let task = Task {
            task_id: task_id.clone(),
            user_id,
            mode: edit_mode,
            status: TaskStatus::Pending,
            progress: 0,
            current_step: "queued".to_string(),
            source_image,
            reference_image,
            config,
            credits_consumed: cost,
            result: None,
            error: None,
            refunded: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            processing_time: None,
        };

        if let Err(err) = self.state.relational.insert_task(&task) {
            let _ = self.state.relational.credit(&task.user_id, cost);
            return Err(forge_err_to_rpc(err).into());
        }
        if let Err(err) = swapforge_queue::push(&*self.state.kv, &task_id) {
            let _ = swapforge_billing::refund_if_not_refunded(&*self.state.relational, &task, now);
            return Err(forge_err_to_rpc(err).into());
        }

        Ok(task.into())
    }

    async fn get_task(&self, token: String, task_id: String) -> RpcResult<RpcTaskInfo> {
        let user_id = self.state.identity.resolve(&token).map_err(forge_err_to_rpc)?;
        let id = TaskId::from_hex(task_id.clone());

        let task = self
            .state
            .relational
            .get_task(&id)
            .map_err(forge_err_to_rpc)?
            .ok_or_else(|| forge_err_to_rpc(ForgeError::TaskNotFound(task_id.clone())))?;

        if task.user_id != user_id {
            return Err(forge_err_to_rpc(ForgeError::Forbidden).into());
        }
        Ok(task.into())
    }

    async fn list_tasks(
        &self,
        token: String,
        status: Option<String>,
        mode: Option<String>,
        page: u32,
        page_size: u32,
    ) -> RpcResult<RpcTaskPage> {
        let user_id = self.state.identity.resolve(&token).map_err(forge_err_to_rpc)?;
        let status = status.as_deref().map(parse_status).transpose().map_err(forge_err_to_rpc)?;
        let mode = mode
            .as_deref()
            .map(str::parse::<EditMode>)
            .transpose()
            .map_err(forge_err_to_rpc)?;

        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let tasks = self
            .state
            .relational
            .list_tasks(&user_id, status, mode, page, page_size)
            .map_err(forge_err_to_rpc)?;
        let total = self
            .state
            .relational
            .count_tasks(&user_id, status, mode)
            .map_err(forge_err_to_rpc)?;

        Ok(RpcTaskPage {
            tasks: tasks.into_iter().map(RpcTaskInfo::from).collect(),
            total,
            page,
            page_size,
        })
    }

    async fn cancel_task(&self, token: String, task_id: String) -> RpcResult<RpcCancelResult> {
        let user_id = self.state.identity.resolve(&token).map_err(forge_err_to_rpc)?;
        let id = TaskId::from_hex(task_id.clone());

        let task = self
            .state
            .relational
            .get_task(&id)
            .map_err(forge_err_to_rpc)?
            .ok_or_else(|| forge_err_to_rpc(ForgeError::TaskNotFound(task_id.clone())))?;
        if task.user_id != user_id {
            return Err(forge_err_to_rpc(ForgeError::Forbidden).into());
        }

        let now = chrono::Utc::now().timestamp();
        let applied = self
            .state
            .relational
            .update_status(&id, TaskStatus::Cancelled, None, Some("cancelled".to_string()), None, None, None, now)
            .map_err(forge_err_to_rpc)?;
        if !applied {
            return Err(forge_err_to_rpc(ForgeError::TerminalStateTransition).into());
        }

        let cancelled = self
            .state
            .relational
            .get_task(&id)
            .map_err(forge_err_to_rpc)?
            .ok_or_else(|| forge_err_to_rpc(ForgeError::TaskNotFound(task_id.clone())))?;
        swapforge_billing::refund_if_not_refunded(&*self.state.relational, &cancelled, now).map_err(forge_err_to_rpc)?;

        Ok(RpcCancelResult { task_id, status: "cancelled".to_string() })
    }
}

fn check_and_debit_rpc(
    store: &dyn RelationalStore,
    user_id: &swapforge_core::types::UserId,
    amount: i64,
) -> RpcResult<DebitOutcome> {
    swapforge_billing::check_and_debit(store, user_id, amount).map_err(|e| forge_err_to_rpc(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapforge_store::{ForgeDb, User};

    struct FixedIdentity(swapforge_core::types::UserId);

    impl Identity for FixedIdentity {
        fn resolve(&self, token: &str) -> Result<swapforge_core::types::UserId, ForgeError> {
            if token == "valid" {
                Ok(self.0.clone())
            } else {
                Err(ForgeError::Unauthenticated)
            }
        }
    }

    fn server_with(user: &User) -> RpcServer {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(ForgeDb::open(dir.path()).unwrap());
        db.put_user(user).unwrap();
        let state = Arc::new(RpcServerState {
            relational: db.clone(),
            kv: db,
            identity: Arc::new(FixedIdentity(user.user_id.clone())),
        });
        RpcServer::new(state)
    }

    #[tokio::test]
    async fn create_task_debits_and_enqueues() {
        let mut user = User::new("u@x.com".to_string(), 0);
        user.current_credits = 100;
        let server = server_with(&user);

        let info = server
            .create_task(
                "valid".to_string(),
                "HEAD_SWAP".to_string(),
                "img_s".to_string(),
                serde_json::json!({"reference_image": "img_r", "quality": "standard", "size": "medium"}),
            )
            .await
            .unwrap();

        assert_eq!(info.status, "pending");
        assert_eq!(info.credits_consumed, 48);
    }

    #[tokio::test]
    async fn create_task_rejects_insufficient_credits_without_mutating_balance() {
        let mut user = User::new("u@x.com".to_string(), 0);
        user.current_credits = 10;
        let server = server_with(&user);

        let err = server
            .create_task(
                "valid".to_string(),
                "HEAD_SWAP".to_string(),
                "img_s".to_string(),
                serde_json::json!({"reference_image": "img_r"}),
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("insufficient"));
    }

    #[tokio::test]
    async fn create_task_rejects_unauthenticated_token() {
        let user = User::new("u@x.com".to_string(), 0);
        let server = server_with(&user);

        let err = server
            .create_task(
                "wrong".to_string(),
                "HEAD_SWAP".to_string(),
                "img_s".to_string(),
                serde_json::json!({"reference_image": "img_r"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unauthenticated"));
    }

    #[tokio::test]
    async fn get_task_rejects_cross_user_access() {
        let mut owner = User::new("owner@x.com".to_string(), 0);
        owner.current_credits = 100;
        let server = server_with(&owner);

        let created = server
            .create_task(
                "valid".to_string(),
                "HEAD_SWAP".to_string(),
                "img_s".to_string(),
                serde_json::json!({"reference_image": "img_r"}),
            )
            .await
            .unwrap();

        struct OtherIdentity;
        impl Identity for OtherIdentity {
            fn resolve(&self, _token: &str) -> Result<swapforge_core::types::UserId, ForgeError> {
                Ok(swapforge_core::types::UserId::generate())
            }
        }
        let intruder_state = Arc::new(RpcServerState {
            relational: server.state.relational.clone(),
            kv: server.state.kv.clone(),
            identity: Arc::new(OtherIdentity),
        });
        let intruder_view = RpcServer::new(intruder_state);

        let err = intruder_view.get_task("valid".to_string(), created.task_id).await.unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }

    #[tokio::test]
    async fn cancel_task_twice_refunds_exactly_once_and_rejects_the_second() {
        let mut user = User::new("u@x.com".to_string(), 0);
        user.current_credits = 100;
        let server = server_with(&user);

        let created = server
            .create_task(
                "valid".to_string(),
                "HEAD_SWAP".to_string(),
                "img_s".to_string(),
                serde_json::json!({"reference_image": "img_r"}),
            )
            .await
            .unwrap();
        assert_eq!(
            server.state.relational.get_user(&user.user_id).unwrap().unwrap().current_credits,
            52
        );

        let result = server.cancel_task("valid".to_string(), created.task_id.clone()).await.unwrap();
        assert_eq!(result.status, "cancelled");
        assert_eq!(
            server.state.relational.get_user(&user.user_id).unwrap().unwrap().current_credits,
            100
        );

        let second = server.cancel_task("valid".to_string(), created.task_id).await.unwrap_err();
        assert!(second.to_string().contains("terminal"));
        assert_eq!(
            server.state.relational.get_user(&user.user_id).unwrap().unwrap().current_credits,
            100
        );
    }
}

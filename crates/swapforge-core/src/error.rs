use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Input errors ─────────────────────────────────────────────────────────
    #[error("invalid edit mode: {0}")]
    InvalidMode(String),

    #[error("invalid source image: {0}")]
    InvalidSourceImage(String),

    #[error("missing reference image for mode {0}")]
    MissingReferenceImage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ── Authn/z ──────────────────────────────────────────────────────────────
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    // ── Billing ──────────────────────────────────────────────────────────────
    #[error("insufficient credits: required {required}, current {current}, deficit {deficit}")]
    CreditNotEnough {
        required: i64,
        current: i64,
        deficit: i64,
    },

    #[error("balance write failed: {0}")]
    BalanceWriteFailed(String),

    // ── Resource ─────────────────────────────────────────────────────────────
    #[error("image load failed: {0}")]
    ImageLoadFailed(String),

    #[error("result save failed: {0}")]
    ResultSaveFailed(String),

    #[error("task data not found: {0}")]
    TaskDataNotFound(String),

    // ── Engine ───────────────────────────────────────────────────────────────
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("engine poll timed out after {elapsed_secs}s")]
    EngineTimeout { elapsed_secs: u64 },

    #[error("engine task failed: {0}")]
    EngineFailed(String),

    #[error("result not found: {0}")]
    ResultNotFound(String),

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("pipeline error: {0}")]
    PipelineError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    // ── Serialization / storage (ambient, not named in the error taxonomy
    // but required to implement the facades that realize it) ──────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Task lifecycle ──────────────────────────────────────────────────────
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task is already in a terminal state")]
    TerminalStateTransition,

    #[error("user not found: {0}")]
    UserNotFound(String),

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("engine not bound: {0}")]
    EngineNotBound(String),

    #[error("unknown engine type: {0}")]
    UnknownEngineType(String),

    #[error("required environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Machine-readable tag matching the abstract error-kind taxonomy; RPC
    /// facades map this to an HTTP status and JSON error shape.
    pub fn code(&self) -> &'static str {
        match self {
            ForgeError::InvalidMode(_) => "INVALID_MODE",
            ForgeError::InvalidSourceImage(_) => "INVALID_SOURCE_IMAGE",
            ForgeError::MissingReferenceImage(_) => "MISSING_REFERENCE_IMAGE",
            ForgeError::InvalidRequest(_) => "INVALID_REQUEST",
            ForgeError::Unauthenticated => "UNAUTHENTICATED",
            ForgeError::Forbidden => "FORBIDDEN",
            ForgeError::CreditNotEnough { .. } => "CREDIT_NOT_ENOUGH",
            ForgeError::BalanceWriteFailed(_) => "BALANCE_WRITE_FAILED",
            ForgeError::ImageLoadFailed(_) => "IMAGE_LOAD_FAILED",
            ForgeError::ResultSaveFailed(_) => "RESULT_SAVE_FAILED",
            ForgeError::TaskDataNotFound(_) => "TASK_DATA_NOT_FOUND",
            ForgeError::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            ForgeError::EngineTimeout { .. } => "ENGINE_TIMEOUT",
            ForgeError::EngineFailed(_) => "ENGINE_FAILED",
            ForgeError::ResultNotFound(_) => "RESULT_NOT_FOUND",
            ForgeError::PipelineError(_) => "PIPELINE_ERROR",
            ForgeError::InternalError(_) => "INTERNAL_ERROR",
            ForgeError::Serialization(_) => "INTERNAL_ERROR",
            ForgeError::Storage(_) => "INTERNAL_ERROR",
            ForgeError::TaskNotFound(_) => "TASK_DATA_NOT_FOUND",
            ForgeError::TerminalStateTransition => "INVALID_REQUEST",
            ForgeError::UserNotFound(_) => "UNAUTHENTICATED",
            ForgeError::EngineNotBound(_) => "ENGINE_UNAVAILABLE",
            ForgeError::UnknownEngineType(_) => "INTERNAL_ERROR",
            ForgeError::MissingEnvVar(_) => "INTERNAL_ERROR",
            ForgeError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

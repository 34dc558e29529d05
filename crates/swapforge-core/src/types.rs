use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-negative credit amount. Signed so intermediate arithmetic (deficit
/// calculations, refund deltas) never has to special-case underflow.
pub type Credits = i64;

/// Unix timestamp, seconds.
pub type Timestamp = i64;

/// Opaque content-addressed handle resolved by the object store facade.
pub type FileHandle = String;

/// Stable user identity. Realized the way the teacher realizes `AccountId`:
/// a fixed-size hash-derived value, hex-encoded at the edges, rather than a
/// library-generated UUID, since no UUID crate is in the dependency stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        Self(generate_hex_id(b"user"))
    }

    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, globally unique task identifier: `blake3(random nonce || created_at)`,
/// hex-encoded. Mirrors the teacher's hash-derived ids without needing the
/// consensus semantics those ids carry there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate(created_at: Timestamp) -> Self {
        Self(generate_hex_id_with_salt(b"task", created_at))
    }

    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_hex_id(domain: &[u8]) -> String {
    generate_hex_id_with_salt(domain, 0)
}

fn generate_hex_id_with_salt(domain: &[u8], salt: i64) -> String {
    let mut nonce = [0u8; 16];
    rand::Rng::fill(&mut rand::thread_rng(), &mut nonce);
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&nonce);
    hasher.update(&salt.to_le_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// The three supported edit modes. Modeled as a tagged variant rather than
/// an inheritance hierarchy, per the documented dispatch-on-mode decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditMode {
    HeadSwap,
    BackgroundChange,
    PoseChange,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::HeadSwap => "HEAD_SWAP",
            EditMode::BackgroundChange => "BACKGROUND_CHANGE",
            EditMode::PoseChange => "POSE_CHANGE",
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EditMode {
    type Err = crate::error::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEAD_SWAP" => Ok(EditMode::HeadSwap),
            "BACKGROUND_CHANGE" => Ok(EditMode::BackgroundChange),
            "POSE_CHANGE" => Ok(EditMode::PoseChange),
            other => Err(crate::error::ForgeError::InvalidMode(other.to_string())),
        }
    }
}

/// Task lifecycle status. Terminal variants are absorbing: once reached no
/// further transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Requested output quality, one factor of the credit cost formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    High,
    Ultra,
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Standard
    }
}

/// Requested output size, the other factor of the credit cost formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
    XLarge,
}

impl Default for Size {
    fn default() -> Self {
        Size::Medium
    }
}

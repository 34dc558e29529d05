//! Credit cost tables and the pricing formula.
//!
//! Values are carried forward from the original provider's cost table
//! (`credits_cost.py`); the rounding rule (`ceil`, not truncation) follows
//! the stricter behavior called out for the cost formula rather than the
//! original's integer truncation.

use crate::types::{Quality, Size};
use crate::types::EditMode;

pub fn base_cost(mode: EditMode) -> f64 {
    match mode {
        EditMode::HeadSwap => 40.0,
        EditMode::BackgroundChange => 30.0,
        EditMode::PoseChange => 50.0,
    }
}

pub fn quality_multiplier(quality: Quality) -> f64 {
    match quality {
        Quality::Standard => 1.0,
        Quality::High => 1.5,
        Quality::Ultra => 2.0,
    }
}

pub fn size_multiplier(size: Size) -> f64 {
    match size {
        Size::Small => 1.0,
        Size::Medium => 1.2,
        Size::Large => 1.5,
        Size::XLarge => 2.0,
    }
}

/// `ceil(base[mode] * quality_mult[quality] * size_mult[size])`.
pub fn calculate_task_credits(mode: EditMode, quality: Quality, size: Size) -> i64 {
    let raw = base_cost(mode) * quality_multiplier(quality) * size_multiplier(size);
    raw.ceil() as i64
}

/// Default signup whitelist floor credits, per the trial whitelist scenario.
pub const WHITELIST_DEFAULT_FLOOR: i64 = 1000;

/// Thumbnail dimensions generated alongside every successful result.
pub const THUMBNAIL_SIZE: u32 = 256;

/// Verification code TTL in seconds.
pub const VERIFICATION_CODE_TTL_SECS: i64 = 600;

/// Default queue pop timeout.
pub const QUEUE_POP_TIMEOUT_SECS: u64 = 5;

/// Default engine adapter upload retry count and fixed backoff.
pub const UPLOAD_MAX_RETRIES: u32 = 3;
pub const UPLOAD_RETRY_BACKOFF_SECS: u64 = 5;

/// Submit retries: stricter than the upstream provider's own constants,
/// since its create endpoint is slow under load.
pub const SUBMIT_MAX_RETRIES: u32 = 5;
pub const SUBMIT_RETRY_BACKOFF_SECS: u64 = 5;

/// Poll loop defaults.
pub const POLL_INTERVAL_SECS: u64 = 3;
pub const POLL_TIMEOUT_SECS: u64 = 300;
pub const POLL_MAX_RETRIES: u32 = 5;

/// Stale-processing threshold used by the queue janitor: recommended at
/// 2x the poll timeout.
pub const STALE_PROCESSING_MULTIPLIER: i64 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_change_ultra_xlarge_is_200() {
        assert_eq!(
            calculate_task_credits(EditMode::PoseChange, Quality::Ultra, Size::XLarge),
            200
        );
    }

    #[test]
    fn head_swap_standard_medium_is_48() {
        assert_eq!(
            calculate_task_credits(EditMode::HeadSwap, Quality::Standard, Size::Medium),
            48
        );
    }

    #[test]
    fn background_change_standard_small_is_30() {
        assert_eq!(
            calculate_task_credits(EditMode::BackgroundChange, Quality::Standard, Size::Small),
            30
        );
    }

    #[test]
    fn head_swap_high_medium_is_72() {
        assert_eq!(
            calculate_task_credits(EditMode::HeadSwap, Quality::High, Size::Medium),
            72
        );
    }
}

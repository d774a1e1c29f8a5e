//! Bridge-wide constants.

use std::time::Duration;

/// Raw handle value meaning "no completion interest". Every non-positive raw
/// handle is normalized to this.
pub const NO_RESPONSE_HANDLER: i64 = 0;

/// Integrity signature stamped into every live session.
pub const BRIDGE_SIGNATURE: u64 = 0x3E2F_AB01_77C4_D915;

pub const DEFAULT_OWNER_THREAD_NAME: &str = "runtime-bridge-owner";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "RUNTIME_BRIDGE";

/// Operation names, as reported in errors and logs.
pub mod operations {
    pub const RETURN_RESULT: &str = "return_result";
    pub const SEND_DATA: &str = "send_data";
    pub const SEND_AUDIO_FRAME: &str = "send_audio_frame";
    pub const SEND_VIDEO_FRAME: &str = "send_video_frame";
}

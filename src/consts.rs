use std::time;

/// Read timeout on the daemon-facing side of a session (§5). Short enough
/// that an unresponsive daemon doesn't wedge a worker thread, long enough
/// that it doesn't spin hot polling for unsolicited frames.
pub const DAEMON_READ_TIMEOUT: time::Duration = time::Duration::from_secs(1);

/// Poll granularity used by the daemon-reader thread and by shutdown
/// cancellation checks.
pub const JOIN_POLL_DURATION: time::Duration = time::Duration::from_millis(100);

pub const BUF_SIZE: usize = 1024 * 16;

/// Length of the randomly generated here-doc token (§4.1, §9).
pub const HEREDOC_TOKEN_LEN: usize = 8;

/// Width of the fixed response header, including the trailing LF (§4.1).
pub const RESPONSE_HEADER_LEN: usize = 13;

pub const DEFAULT_CONSOLE_ADDR: &str = "0.0.0.0:6083";
pub const DEFAULT_DAEMON_ADDR: &str = "localhost:6082";
pub const DEFAULT_MASTER_ADDR: &str = "localhost:6084";

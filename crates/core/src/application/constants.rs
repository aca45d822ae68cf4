// Supervisor constants (No magic values)
use std::time::Duration;

/// Delay between SIGTERM and SIGKILL (2s)
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Liveness polling interval while waiting for a signaled worker (100ms)
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the kernel to reap a SIGKILLed worker before
/// reporting the kill as unconfirmed (1s)
pub const KILL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(1);

/// Allowed drift between recorded and observed process start times.
/// Start times are derived from boot time plus clock ticks and can jitter.
pub const START_TIME_TOLERANCE_SECS: u64 = 2;

/// Environment variable carrying the worker's session token
pub const SESSION_TOKEN_ENV: &str = "PIXSTAR_SUPERVISOR_SESSION";

/// Handle file name, relative to the base directory
pub const DEFAULT_PID_FILE: &str = "immich-pixstar.pid";

/// Worker program and arguments
pub const DEFAULT_WORKER_PROGRAM: &str = "python";
pub const DEFAULT_WORKER_ARGS: &[&str] = &["main.py"];

/// Virtual environment directory, relative to the base directory
pub const DEFAULT_VENV_DIR: &str = "venv";

/// Command-line substring used to find the worker when no handle exists
pub const DEFAULT_FALLBACK_PATTERN: &str = "main.py";

/// Mounted configuration directory (container deployment)
pub const DEFAULT_CONFIG_SOURCE_DIR: &str = "/config";

/// Optional files staged from the mounted configuration directory
pub const DEFAULT_PROVISIONED_FILES: &[&str] = &[".env", "pixstar_mapping.json"];

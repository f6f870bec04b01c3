use std::fmt;
use std::io;

use guibridge_bridge::{BridgeError, LoopExit};
use guibridge_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::Corrupt { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::Marshal(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        BridgeError::Spawn { source, .. } => io_error(context, source),
        BridgeError::Schema(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Process exit code for how the session ended.
pub fn session_exit_code(exit: &LoopExit) -> i32 {
    match exit {
        LoopExit::Quit | LoopExit::Closed => SUCCESS,
        LoopExit::Corrupt => DATA_INVALID,
        LoopExit::Failed(_) => FAILURE,
    }
}

//! Safety Utilities
//!
//! Shared by every component that touches the filesystem or shells out:
//! - Path containment and file-name sanitisation
//! - Secret redaction for logs and errors
//! - Allow-listed, timeout-bounded process execution
//! - Atomic file replacement

pub mod atomic;
pub mod exec;
pub mod paths;
pub mod redact;

pub use atomic::{write_atomic, write_json_atomic};
pub use exec::{ExecOptions, ExecOutput, SecureExecutor};
pub use paths::{sanitize_filename, validate_existing_path, validate_path};
pub use redact::{sanitize_log, REDACTION_MARKER};

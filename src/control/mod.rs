//! Control module - outbound session commands and stdout output.
//!
//! # Example
//!
//! ```ignore
//! use frame_collector::control::{send_auth, send_status, write_stdout_json};
//!
//! send_auth(&mut stream, "token").await?;
//! // ... collect ...
//! send_status(&mut stream).await?;
//! write_stdout_json(&controller.status())?;
//! ```

mod commands;
mod stdio;

pub use commands::{send_auth, send_status};
pub use stdio::{write_json_line, write_stdout_json};

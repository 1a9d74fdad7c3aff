//! # frame-collector
//!
//! Streaming collector for a server that interleaves two frame formats on a
//! single TCP stream.
//!
//! ## Wire formats
//!
//! - **ASCII**: `$` + printable payload + `;`
//! - **Binary**: `0xAA` + 5-byte big-endian length + payload
//!
//! Frames are reassembled from arbitrarily chunked reads, validated, handed
//! to a [`persist::Sink`] and counted. Once the target count is reached the
//! collector sends `STATUS`, drains the connection for a bounded time and
//! goes idle.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use frame_collector::{CollectionController, CollectorConfig};
//! use frame_collector::persist::MemorySink;
//!
//! #[tokio::main]
//! async fn main() -> frame_collector::Result<()> {
//!     let config = CollectorConfig::new()
//!         .with_address("127.0.0.1", 9000)
//!         .with_token("secret");
//!     let controller = CollectionController::new(config, Arc::new(MemorySink::new()));
//!
//!     controller.start().await?;
//!     controller.wait_until_idle().await;
//!
//!     println!("{:?}", controller.status());
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod control;
pub mod error;
pub mod persist;
pub mod protocol;
pub mod transport;
pub mod validation;

pub use collector::{CollectionController, CollectionStatus, ErrorKind, ErrorRecord, Phase};
pub use config::CollectorConfig;
pub use error::{CollectorError, Result};

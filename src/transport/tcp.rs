//! TCP connect with a deadline.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use frame_collector::transport::connect;
//!
//! let stream = connect("127.0.0.1:9000", Duration::from_secs(10)).await?;
//! ```

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{CollectorError, Result};

/// Open a TCP connection to `addr`, failing after `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(CollectorError::ConnectTimeout {
                addr: addr.to_string(),
            })
        }
    };

    // Small control messages must not wait for Nagle coalescing.
    stream.set_nodelay(true)?;
    debug!(addr, "connected");
    Ok(stream)
}

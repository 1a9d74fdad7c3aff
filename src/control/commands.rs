//! Outbound control commands.
//!
//! The collector sends exactly two messages on the data connection:
//! `AUTH <token>` right after connecting and `STATUS` when the session
//! starts draining. Neither is newline-terminated.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{build_auth_message, STATUS_COMMAND};

async fn send<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Send the authentication message.
pub async fn send_auth<W>(writer: &mut W, token: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send(writer, &build_auth_message(token)).await?;
    debug!("auth message sent");
    Ok(())
}

/// Send the termination command.
pub async fn send_status<W>(writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send(writer, STATUS_COMMAND).await?;
    debug!("termination command sent");
    Ok(())
}

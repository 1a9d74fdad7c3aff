//! Transport module - connection to the remote data server.
//!
//! The collector speaks plain TCP. Sessions accept any
//! `AsyncRead + AsyncWrite` stream, so tests can substitute an in-memory
//! `tokio::io::duplex` pair.

mod tcp;

pub use tcp::connect;

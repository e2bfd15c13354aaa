//! # commpack-link
//!
//! Moves finalized frames over a byte stream.
//!
//! The link works with anything implementing `AsyncRead + AsyncWrite`: a
//! serial device opened as a file, a pipe, or a socket. Opening and
//! configuring the device is left to the caller.

pub mod error;
pub mod link;

pub use error::LinkError;
pub use link::{FrameLink, LinkConfig};

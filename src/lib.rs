#![forbid(unsafe_code)]
//! directmail — hand one message straight to the recipient's mail exchanger
//!
//! Resolve the MX hosts of the recipient domain, walk hosts and ports in order
//! until one answers, then drive a minimal SMTP exchange for a single message.
//! No relay, no TLS, no authentication.

#[macro_use]
mod log;

mod context;
mod error;
mod message;
mod options;

pub mod mx;
pub mod smtp;

#[cfg(test)]
mod test_support;

pub use context::{CancelHandle, Cancelled, SendContext};
pub use error::{ErrorKind, SendError};
pub use message::Message;
pub use mx::{MxError, MxRecord, lookup_mx};
pub use options::{DEFAULT_PORTS, HostFallback, SendOptions};
pub use smtp::{ConnectError, ProtocolError, SmtpReply, Stage};

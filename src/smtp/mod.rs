//! Connector and transfer session.
//!
//! `connect` walks the candidate hosts and ports in order and returns the
//! first session that completed its greeting and hello; `deliver` drives the
//! envelope, data phase and `QUIT` over that session.

mod connector;
mod deliver;
mod error;
mod session;
mod types;

pub use error::{ConnectError, ProtocolError};
pub use types::{SmtpReply, Stage};

pub(crate) use connector::{Dial, TcpDialer, Transport, connect};
pub(crate) use deliver::deliver;

use std::io;

use thiserror::Error;

use super::types::{SmtpReply, Stage};

/// Failure while talking SMTP over an established connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
    #[error("{stage} rejected: {reply}")]
    Rejected { stage: Stage, reply: SmtpReply },
    #[error("{stage} argument must not contain CR or LF")]
    InvalidLine { stage: Stage },
}

impl ProtocolError {
    pub(crate) fn io(stage: Stage, source: io::Error) -> Self {
        Self::Io { stage, source }
    }

    pub(crate) fn rejected(stage: Stage, reply: SmtpReply) -> Self {
        Self::Rejected { stage, reply }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Io { stage, .. } | Self::Rejected { stage, .. } | Self::InvalidLine { stage } => {
                *stage
            }
        }
    }
}

/// Failure to obtain a live session on any candidate host/port.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection to {address} failed: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("SMTP handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: ProtocolError,
    },
    #[error("couldn't connect to servers [{}] on any common port", hosts.join(", "))]
    NoReachableServer {
        hosts: Vec<String>,
        #[source]
        last: Option<Box<ConnectError>>,
    },
}

impl ConnectError {
    /// `host:port` of the failed attempt, if this error describes one.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Dial { address, .. } | Self::Handshake { address, .. } => Some(address),
            Self::NoReachableServer { .. } => None,
        }
    }
}

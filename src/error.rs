use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::context::Cancelled;
use crate::mx::MxError;
use crate::smtp::{ConnectError, ProtocolError};

/// The single error a send call can end with.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid recipient address: <{address}>")]
    InvalidRecipient { address: String },
    #[error(transparent)]
    Resolution(#[from] MxError),
    #[error(transparent)]
    Connection(#[from] ConnectError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Coarse classification of a [`SendError`].
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resolution,
    Connection,
    Protocol,
}

impl SendError {
    pub(crate) fn invalid_recipient(address: impl Into<String>) -> Self {
        Self::InvalidRecipient {
            address: address.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRecipient { .. } => ErrorKind::Validation,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// Whether the context's deadline or cancel handle caused the failure.
    ///
    /// Cancellation is not a kind of its own: it surfaces as the failure of
    /// whichever step it interrupted, with [`Cancelled`] somewhere in the
    /// source chain.
    pub fn is_cancellation(&self) -> bool {
        self.cancellation().is_some()
    }

    pub fn cancellation(&self) -> Option<Cancelled> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(reason) = err.downcast_ref::<Cancelled>() {
                return Some(*reason);
            }
            if let Some(reason) = err
                .downcast_ref::<io::Error>()
                .and_then(|io_err| io_err.get_ref())
                .and_then(|inner| inner.downcast_ref::<Cancelled>())
            {
                return Some(*reason);
            }
            current = err.source();
        }
        None
    }
}

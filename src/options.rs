#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Ports tried on every MX host, in this order.
pub const DEFAULT_PORTS: [u16; 3] = [25, 2525, 587];

/// What to do once every port of a host has failed.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostFallback {
    /// Move on to the next MX host; fail only after the last host is exhausted.
    #[default]
    NextHost,
    /// Return the failure of the last port of the first exhausted host.
    AbortOnExhaustedHost,
}

/// Controls how [`Message::send_with_options`](crate::Message::send_with_options)
/// reaches the recipient's mail exchanger.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub ports: Vec<u16>,
    pub helo_domain: String,
    pub host_fallback: HostFallback,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            helo_domain: "localhost".to_string(),
            host_fallback: HostFallback::NextHost,
        }
    }
}

impl SendOptions {
    /// Name announced in `EHLO`/`HELO`; `localhost` when left blank.
    pub fn helo_name(&self) -> &str {
        let trimmed = self.helo_domain.trim();
        if trimmed.is_empty() {
            "localhost"
        } else {
            trimmed
        }
    }
}

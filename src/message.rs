use crate::context::SendContext;
use crate::error::SendError;
use crate::mx::{LookupMx, SystemResolver, resolve_hosts};
use crate::options::SendOptions;
use crate::smtp::{Dial, TcpDialer, connect, deliver};

/// A single message for a single recipient.
///
/// `to` must contain an `@`; the other fields may be empty, in which case the
/// matching header line is left out.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn new(
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Send with no deadline and the default options.
    pub fn send(&self) -> Result<(), SendError> {
        self.send_with_context(&SendContext::background())
    }

    /// Send under `ctx`: every lookup, connect and round trip is bounded by it.
    pub fn send_with_context(&self, ctx: &SendContext) -> Result<(), SendError> {
        self.send_with_options(ctx, &SendOptions::default())
    }

    pub fn send_with_options(
        &self,
        ctx: &SendContext,
        options: &SendOptions,
    ) -> Result<(), SendError> {
        send_with(self, ctx, options, &SystemResolver, &TcpDialer)
    }

    /// Domain part of the recipient: everything after the last `@`.
    pub fn recipient_domain(&self) -> Option<&str> {
        self.to.rsplit_once('@').map(|(_, domain)| domain)
    }
}

pub(crate) fn send_with<R, D>(
    message: &Message,
    ctx: &SendContext,
    options: &SendOptions,
    resolver: &R,
    dialer: &D,
) -> Result<(), SendError>
where
    R: LookupMx,
    D: Dial,
{
    let domain = message
        .recipient_domain()
        .ok_or_else(|| SendError::invalid_recipient(&message.to))?;
    let hosts = resolve_hosts(resolver, domain, ctx)?;
    let session = connect(dialer, &hosts, options, ctx)?;
    deliver(session, message, ctx)?;
    log_debug!(to = %message.to, "message handed off");
    Ok(())
}

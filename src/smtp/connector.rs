use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::error::ConnectError;
use super::session::SmtpSession;
use crate::context::SendContext;
use crate::options::{HostFallback, SendOptions};

/// Byte stream a session runs over.
pub(crate) trait Transport: Read + Write {
    /// Bound the next reads and writes; `None` blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }
}

/// Opens one transport connection to a `host:port` address.
pub(crate) trait Dial {
    type Stream: Transport;

    fn dial(&self, address: &str, ctx: &SendContext) -> io::Result<Self::Stream>;
}

/// Plain TCP, each socket address tried in turn within the context budget.
///
/// Under a bounded context, name lookup and connect run on a helper thread so
/// neither can outlive the deadline or a tripped cancel handle.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TcpDialer;

impl Dial for TcpDialer {
    type Stream = TcpStream;

    fn dial(&self, address: &str, ctx: &SendContext) -> io::Result<TcpStream> {
        ctx.check()?;
        if !ctx.is_bounded() {
            return connect_any(address, ctx);
        }
        let target = address.to_string();
        let worker_ctx = ctx.clone();
        ctx.wait_for("directmail-dial", move || connect_any(&target, &worker_ctx))?
    }
}

fn connect_any(address: &str, ctx: &SendContext) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = address.to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in &addrs {
        let attempt = match ctx.remaining()? {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    // connect_timeout cut short by the deadline
    ctx.check()?;
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no socket address available",
        )
    }))
}

/// Walk `hosts` (outer) and `options.ports` (inner) strictly in order and
/// return the first session that completes greeting and hello.
///
/// At most one connection is open at a time: a failed attempt is dropped
/// before the next pair is tried. A failure on the last port of a host either
/// moves on to the next host or ends the call, depending on
/// [`HostFallback`].
pub(crate) fn connect<D>(
    dialer: &D,
    hosts: &[String],
    options: &SendOptions,
    ctx: &SendContext,
) -> Result<SmtpSession<D::Stream>, ConnectError>
where
    D: Dial,
{
    let servers: Vec<&str> = hosts
        .iter()
        .map(|host| host.trim_end_matches('.'))
        .collect();
    let helo = options.helo_name();
    let mut last_failure = None;

    for server in &servers {
        for (index, port) in options.ports.iter().enumerate() {
            let address = format!("{server}:{port}");
            match attempt(dialer, server, &address, helo, ctx) {
                Ok(session) => {
                    log_debug!(%address, "SMTP session established");
                    return Ok(session);
                }
                Err(err) => {
                    log_debug!(error = %err, "attempt failed");
                    let last_port = index + 1 == options.ports.len();
                    if last_port && options.host_fallback == HostFallback::AbortOnExhaustedHost {
                        return Err(err);
                    }
                    last_failure = Some(err);
                }
            }
        }
    }

    Err(ConnectError::NoReachableServer {
        hosts: servers.iter().map(|server| server.to_string()).collect(),
        last: last_failure.map(Box::new),
    })
}

fn attempt<D>(
    dialer: &D,
    server: &str,
    address: &str,
    helo: &str,
    ctx: &SendContext,
) -> Result<SmtpSession<D::Stream>, ConnectError>
where
    D: Dial,
{
    let stream = dialer
        .dial(address, ctx)
        .map_err(|source| ConnectError::Dial {
            address: address.to_string(),
            source,
        })?;
    SmtpSession::open(server, stream, helo, ctx).map_err(|source| ConnectError::Handshake {
        address: address.to_string(),
        source,
    })
}

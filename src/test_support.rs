//! In-memory doubles for the resolver and the network.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::context::SendContext;
use crate::mx::{LookupMx, MxError, MxRecord};
use crate::smtp::{Dial, Transport};

type LookupResult = Result<Vec<MxRecord>, MxError>;
type LookupFn = dyn Fn(&str) -> LookupResult + Send + Sync;

pub(crate) const HANDSHAKE: &[&str] = &["220 mx.test ESMTP", "250 mx.test"];

pub(crate) const DELIVERY: &[&str] = &[
    "220 mx.test ESMTP",
    "250 mx.test",
    "250 2.1.0 Ok",
    "250 2.1.5 Ok",
    "354 End data with <CR><LF>.<CR><LF>",
    "250 2.0.0 Ok: queued",
    "221 2.0.0 Bye",
];

/// Server replies, CRLF-terminated, in the order the client will read them.
pub(crate) fn script(replies: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for reply in replies {
        out.extend_from_slice(reply.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

pub(crate) struct StubResolver {
    pub on_lookup: Box<LookupFn>,
}

impl StubResolver {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LookupResult + Send + Sync + 'static,
    {
        Self {
            on_lookup: Box::new(f),
        }
    }

    pub(crate) fn hosts(names: &[&str]) -> Self {
        let records: Vec<MxRecord> = names
            .iter()
            .enumerate()
            .map(|(index, name)| MxRecord::new((index as u16 + 1) * 10, *name))
            .collect();
        Self::new(move |_| Ok(records.clone()))
    }

    /// Panics if consulted.
    pub(crate) fn unreachable() -> Self {
        Self::new(|domain| panic!("resolver must not be consulted (asked for {domain})"))
    }
}

impl LookupMx for StubResolver {
    fn lookup_mx(&self, domain: &str, _ctx: &SendContext) -> LookupResult {
        (self.on_lookup)(domain)
    }
}

/// Connections handed out by a [`StubDialer`] and not yet dropped.
#[derive(Default)]
struct LiveConnections {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Counts one dialled stream as live until it is dropped.
struct Lease(Arc<LiveConnections>);

impl Lease {
    fn acquire(live: &Arc<LiveConnections>) -> Self {
        let now = live.current.fetch_add(1, Ordering::SeqCst) + 1;
        live.peak.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pre-recorded server side; everything the client writes is captured.
///
/// Clones share the captured output but not the live-connection lease.
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
    // held for its Drop
    #[allow(dead_code)]
    lease: Option<Lease>,
}

impl Clone for ScriptedStream {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            output: Arc::clone(&self.output),
            lease: None,
        }
    }
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Arc::new(Mutex::new(Vec::new())),
            lease: None,
        }
    }

    pub(crate) fn written(&self) -> String {
        let output = self.output.lock().expect("output lock");
        String::from_utf8_lossy(&output).into_owned()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.lock().expect("output lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedStream {
    fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

/// Peer that accepts the connection and never speaks. Each read waits out
/// the armed timeout, five seconds when none is set.
#[derive(Default)]
pub(crate) struct StallingStream {
    timeout: Option<Duration>,
}

impl Read for StallingStream {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(self.timeout.unwrap_or(Duration::from_secs(5)));
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
    }
}

impl Write for StallingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for StallingStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }
}

/// Refuses every address except the scripted ones; records each attempt and
/// tracks how many dialled streams are still alive.
#[derive(Default)]
pub(crate) struct StubDialer {
    servers: HashMap<String, ScriptedStream>,
    attempts: Mutex<Vec<String>>,
    live: Arc<LiveConnections>,
}

impl StubDialer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accept(mut self, address: &str, replies: &[&str]) -> Self {
        self.servers
            .insert(address.to_string(), ScriptedStream::new(script(replies)));
        self
    }

    pub(crate) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("attempts lock").clone()
    }

    /// Streams dialled and not yet dropped.
    pub(crate) fn live(&self) -> usize {
        self.live.current.load(Ordering::SeqCst)
    }

    /// Most streams alive at the same time so far.
    pub(crate) fn peak_live(&self) -> usize {
        self.live.peak.load(Ordering::SeqCst)
    }

    /// What the client wrote to the server listening on `address`.
    pub(crate) fn written_to(&self, address: &str) -> String {
        self.servers
            .get(address)
            .map(ScriptedStream::written)
            .unwrap_or_default()
    }
}

impl Dial for StubDialer {
    type Stream = ScriptedStream;

    fn dial(&self, address: &str, ctx: &SendContext) -> io::Result<ScriptedStream> {
        ctx.check()?;
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(address.to_string());
        let mut stream = self.servers.get(address).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
        })?;
        stream.lease = Some(Lease::acquire(&self.live));
        Ok(stream)
    }
}

use std::io::{self, BufRead, BufReader, Read, Write};

use super::connector::Transport;
use super::error::ProtocolError;
use super::types::{SmtpReply, Stage};
use crate::context::SendContext;

/// One live SMTP conversation with a single `host:port`.
///
/// Dropping the session closes the underlying connection, so every exit path
/// of a send releases it. Before each round trip the transport is re-armed
/// with the context of the calling step.
pub(crate) struct SmtpSession<S> {
    #[cfg_attr(not(feature = "with-tracing"), allow(dead_code))]
    host: String,
    reader: BufReader<Bounded<S>>,
    at_line_start: bool,
}

/// Transport whose every read and write is bounded by a context.
///
/// Socket timeouts follow `SendContext::slice`: a wait that runs out while
/// the context is still live is retried, so a cancellable context is polled
/// between slices instead of blocking until the peer speaks.
struct Bounded<S> {
    inner: S,
    ctx: SendContext,
}

impl<S: Transport> Bounded<S> {
    fn arm(&mut self) -> io::Result<()> {
        let timeout = self.ctx.slice()?;
        self.inner.set_timeout(timeout)
    }

    fn slice_elapsed(&self, err: &io::Error) -> bool {
        self.ctx.is_cancellable() && is_timeout(err)
    }
}

impl<S: Transport> Read for Bounded<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            self.arm()?;
            match self.inner.read(buf) {
                Err(err) if self.slice_elapsed(&err) => self.ctx.check()?,
                result => return result,
            }
        }
    }
}

impl<S: Transport> Write for Bounded<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            self.arm()?;
            match self.inner.write(buf) {
                Err(err) if self.slice_elapsed(&err) => self.ctx.check()?,
                result => return result,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            self.arm()?;
            match self.inner.flush() {
                Err(err) if self.slice_elapsed(&err) => self.ctx.check()?,
                result => return result,
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

impl<S: Transport> SmtpSession<S> {
    /// Read the `220` greeting, then `EHLO` (falling back to `HELO` when the
    /// server refuses it).
    pub(crate) fn open(
        host: &str,
        stream: S,
        helo: &str,
        ctx: &SendContext,
    ) -> Result<Self, ProtocolError> {
        let mut session = Self {
            host: host.to_string(),
            reader: BufReader::new(Bounded {
                inner: stream,
                ctx: ctx.clone(),
            }),
            at_line_start: true,
        };
        session.arm(Stage::Greeting, ctx)?;
        let greeting = session.reply(Stage::Greeting, ctx)?;
        expect(Stage::Greeting, greeting, &[220])?;
        session.hello(helo, ctx)?;
        Ok(session)
    }

    fn hello(&mut self, helo: &str, ctx: &SendContext) -> Result<(), ProtocolError> {
        let reply = self.command(Stage::Ehlo, &format!("EHLO {helo}"), ctx)?;
        if reply.is_positive_completion() {
            return Ok(());
        }
        log_debug!(host = %self.host, %reply, "EHLO refused, falling back to HELO");
        let reply = self.command(Stage::Helo, &format!("HELO {helo}"), ctx)?;
        expect(Stage::Helo, reply, &[250]).map(|_| ())
    }

    pub(crate) fn mail(&mut self, from: &str, ctx: &SendContext) -> Result<(), ProtocolError> {
        let reply = self.command(Stage::MailFrom, &format!("MAIL FROM:<{from}>"), ctx)?;
        expect(Stage::MailFrom, reply, &[250]).map(|_| ())
    }

    pub(crate) fn rcpt(&mut self, to: &str, ctx: &SendContext) -> Result<(), ProtocolError> {
        let reply = self.command(Stage::RcptTo, &format!("RCPT TO:<{to}>"), ctx)?;
        expect(Stage::RcptTo, reply, &[250, 251]).map(|_| ())
    }

    pub(crate) fn data(&mut self, ctx: &SendContext) -> Result<(), ProtocolError> {
        let reply = self.command(Stage::Data, "DATA", ctx)?;
        expect(Stage::Data, reply, &[354])?;
        self.at_line_start = true;
        Ok(())
    }

    /// Stream message bytes verbatim; no dot-stuffing, no line ending rewrite.
    pub(crate) fn write_data(
        &mut self,
        bytes: &[u8],
        ctx: &SendContext,
    ) -> Result<(), ProtocolError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.arm(Stage::Content, ctx)?;
        self.reader
            .get_mut()
            .write_all(bytes)
            .map_err(|err| failure(Stage::Content, err, ctx))?;
        self.at_line_start = bytes.ends_with(b"\r\n");
        Ok(())
    }

    /// Terminate the data phase with `<CRLF>.<CRLF>` and wait for acceptance.
    pub(crate) fn finish_data(&mut self, ctx: &SendContext) -> Result<(), ProtocolError> {
        self.arm(Stage::EndOfData, ctx)?;
        let terminator: &[u8] = if self.at_line_start {
            b".\r\n"
        } else {
            b"\r\n.\r\n"
        };
        let stream = self.reader.get_mut();
        stream
            .write_all(terminator)
            .and_then(|()| stream.flush())
            .map_err(|err| failure(Stage::EndOfData, err, ctx))?;
        self.at_line_start = true;
        let reply = self.reply(Stage::EndOfData, ctx)?;
        expect(Stage::EndOfData, reply, &[250]).map(|_| ())
    }

    /// Say goodbye and close the connection.
    pub(crate) fn quit(mut self, ctx: &SendContext) -> Result<(), ProtocolError> {
        let reply = self.command(Stage::Quit, "QUIT", ctx)?;
        expect(Stage::Quit, reply, &[221]).map(|_| ())
    }

    fn command(
        &mut self,
        stage: Stage,
        line: &str,
        ctx: &SendContext,
    ) -> Result<SmtpReply, ProtocolError> {
        if line.contains(['\r', '\n']) {
            return Err(ProtocolError::InvalidLine { stage });
        }
        self.arm(stage, ctx)?;
        log_trace!(host = %self.host, "C: {line}");
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let stream = self.reader.get_mut();
        stream
            .write_all(&data)
            .and_then(|()| stream.flush())
            .map_err(|err| failure(stage, err, ctx))?;
        self.reply(stage, ctx)
    }

    fn reply(&mut self, stage: Stage, ctx: &SendContext) -> Result<SmtpReply, ProtocolError> {
        let reply = read_reply(&mut self.reader).map_err(|err| failure(stage, err, ctx))?;
        log_trace!(host = %self.host, "S: {reply}");
        Ok(reply)
    }

    fn arm(&mut self, stage: Stage, ctx: &SendContext) -> Result<(), ProtocolError> {
        ctx.check()
            .map_err(|reason| ProtocolError::io(stage, reason.into()))?;
        self.reader.get_mut().ctx = ctx.clone();
        Ok(())
    }
}

fn expect(stage: Stage, reply: SmtpReply, accepted: &[u16]) -> Result<SmtpReply, ProtocolError> {
    if accepted.contains(&reply.code) {
        Ok(reply)
    } else {
        Err(ProtocolError::rejected(stage, reply))
    }
}

/// A socket timeout that lands after the context expired is reported as the
/// cancellation itself.
fn failure(stage: Stage, err: io::Error, ctx: &SendContext) -> ProtocolError {
    match ctx.check() {
        Err(reason) if is_timeout(&err) => ProtocolError::io(stage, reason.into()),
        _ => ProtocolError::io(stage, err),
    }
}

pub(crate) fn read_reply<R: BufRead>(reader: &mut R) -> io::Result<SmtpReply> {
    let mut code = None;
    let mut message_lines = Vec::new();
    loop {
        let mut raw = String::new();
        let bytes = reader.read_line(&mut raw)?;
        if bytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            ));
        }
        if raw.ends_with('\n') {
            raw.pop();
            if raw.ends_with('\r') {
                raw.pop();
            }
        }

        if raw.len() < 3 || !raw.is_char_boundary(3) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid SMTP reply: '{raw}'"),
            ));
        }
        let code_part = &raw[..3];
        let parsed_code = code_part.parse::<u16>().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid SMTP status code: '{code_part}'"),
            )
        })?;
        if let Some(existing) = code {
            if existing != parsed_code {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("inconsistent SMTP reply codes: {existing} vs {parsed_code}"),
                ));
            }
        } else {
            code = Some(parsed_code);
        }
        let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
        let text = raw.get(4..).unwrap_or_default().to_string();
        message_lines.push(text);
        if !continuation {
            break;
        }
    }
    Ok(SmtpReply {
        code: code.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "SMTP reply missing status code")
        })?,
        message: message_lines.join("\n"),
    })
}

use super::connector::Transport;
use super::error::ProtocolError;
use super::session::SmtpSession;
use crate::context::SendContext;
use crate::message::Message;

/// Hand `message` over on an open session and close it.
///
/// Steps run strictly in order and the first failure is returned as is; the
/// session is dropped (connection closed) on every path.
pub(crate) fn deliver<S>(
    mut session: SmtpSession<S>,
    message: &Message,
    ctx: &SendContext,
) -> Result<(), ProtocolError>
where
    S: Transport,
{
    session.mail(&message.from, ctx)?;
    session.rcpt(&message.to, ctx)?;
    session.data(ctx)?;
    session.write_data(compose_headers(message).as_bytes(), ctx)?;
    session.write_data(message.body.as_bytes(), ctx)?;
    session.finish_data(ctx)?;
    session.quit(ctx)
}

/// `Subject`, `From`, `To` header lines, each only when the field is set.
pub(crate) fn compose_headers(message: &Message) -> String {
    let mut headers = String::new();
    if !message.subject.is_empty() {
        headers.push_str(&format!("Subject: {}\r\n", message.subject));
    }
    if !message.from.is_empty() {
        headers.push_str(&format!("From: <{}>\r\n", message.from));
    }
    if !message.to.is_empty() {
        headers.push_str(&format!("To: <{}>\r\n", message.to));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::{ProtocolError, Stage};
    use crate::test_support::{DELIVERY, ScriptedStream, script};

    fn message(subject: &str, from: &str, to: &str, body: &str) -> Message {
        Message {
            to: to.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    fn session_over(replies: &[&str]) -> (SmtpSession<ScriptedStream>, ScriptedStream) {
        let stream = ScriptedStream::new(script(replies));
        let probe = stream.clone();
        let session =
            SmtpSession::open("mx.test", stream, "localhost", &SendContext::background())
                .expect("handshake");
        (session, probe)
    }

    #[test]
    fn headers_follow_fixed_order() {
        let headers = compose_headers(&message("Hi", "a@x.com", "b@y.com", "hello"));
        assert_eq!(headers, "Subject: Hi\r\nFrom: <a@x.com>\r\nTo: <b@y.com>\r\n");
    }

    #[test]
    fn empty_fields_emit_no_header() {
        assert_eq!(
            compose_headers(&message("", "a@x.com", "b@y.com", "")),
            "From: <a@x.com>\r\nTo: <b@y.com>\r\n"
        );
        assert_eq!(
            compose_headers(&message("Hi", "", "b@y.com", "")),
            "Subject: Hi\r\nTo: <b@y.com>\r\n"
        );
        assert_eq!(
            compose_headers(&message("Hi", "a@x.com", "", "")),
            "Subject: Hi\r\nFrom: <a@x.com>\r\n"
        );
    }

    #[test]
    fn full_exchange_transcript() {
        let (session, probe) = session_over(DELIVERY);
        deliver(
            session,
            &message("Hi", "a@x.com", "b@y.com", "hello"),
            &SendContext::background(),
        )
        .expect("delivered");

        let written = probe.written();
        insta::assert_snapshot!(written.escape_debug().to_string(), @r"EHLO localhost\r\nMAIL FROM:<a@x.com>\r\nRCPT TO:<b@y.com>\r\nDATA\r\nSubject: Hi\r\nFrom: <a@x.com>\r\nTo: <b@y.com>\r\nhello\r\n.\r\nQUIT\r\n");
    }

    #[test]
    fn body_is_written_verbatim() {
        let (session, probe) = session_over(DELIVERY);
        deliver(
            session,
            &message("", "", "b@y.com", ".hidden\nbare lf\r\n"),
            &SendContext::background(),
        )
        .expect("delivered");

        let written = probe.written();
        assert!(written.contains("MAIL FROM:<>\r\n"));
        assert!(written.contains("DATA\r\nTo: <b@y.com>\r\n.hidden\nbare lf\r\n.\r\nQUIT\r\n"));
    }

    #[test]
    fn rejected_recipient_stops_exchange() {
        let (session, probe) = session_over(&[
            "220 mx.test ESMTP",
            "250 mx.test",
            "250 2.1.0 Ok",
            "550 5.1.1 User unknown",
        ]);
        let err = deliver(
            session,
            &message("Hi", "a@x.com", "nobody@y.com", "hello"),
            &SendContext::background(),
        )
        .expect_err("rejected");

        match err {
            ProtocolError::Rejected { stage, reply } => {
                assert_eq!(stage, Stage::RcptTo);
                assert_eq!(reply.code, 550);
                assert_eq!(reply.message, "5.1.1 User unknown");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(!probe.written().contains("DATA"));
    }

    #[test]
    fn refused_message_surfaces_end_of_data_stage() {
        let (session, _probe) = session_over(&[
            "220 mx.test ESMTP",
            "250 mx.test",
            "250 2.1.0 Ok",
            "250 2.1.5 Ok",
            "354 go ahead",
            "554 5.7.1 spam",
        ]);
        let err = deliver(
            session,
            &message("Hi", "a@x.com", "b@y.com", "buy now"),
            &SendContext::background(),
        )
        .expect_err("refused");
        assert_eq!(err.stage(), Stage::EndOfData);
    }
}

//! Relays one execution channel to local sinks.
//!
//! The relay is transport-agnostic: anything implementing [`EventSource`] can
//! feed it, which keeps the streaming, drain, and interrupt rules testable
//! without a live SSH server.

use std::future::Future;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::error::SessionError;
use super::types::ExitStatus;

/// Events surfaced by an execution channel, in arrival order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ChannelEvent {
    /// Bytes written by the remote process to stdout.
    Stdout(Vec<u8>),
    /// Bytes written by the remote process to stderr.
    Stderr(Vec<u8>),
    /// The remote process exited with a status.
    Exited(u32),
    /// The remote process was killed by a signal.
    Signalled { signal: String, code: i32 },
    /// The remote side will send no more data.
    Eof,
    /// The channel was closed by the remote side.
    Closed,
}

/// Source of channel events for a single remote command.
pub(crate) trait EventSource {
    /// Waits for the next event; `None` means the transport went away.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Closes the channel early after a local interrupt.
    async fn abort(&mut self) -> Result<(), SessionError>;
}

enum Step {
    Interrupted,
    Event(Option<ChannelEvent>),
}

/// Forwards channel output to `stdout` and `stderr` until the channel closes.
///
/// Each chunk is flushed as soon as it is written. An exit status does not
/// end the relay: data that was already in flight is drained until the
/// channel closes. When `interrupt` resolves before a status arrives, the
/// channel is aborted and [`ExitStatus::Interrupted`] is returned.
pub(crate) async fn relay<S, O, E, I>(
    source: &mut S,
    stdout: &mut O,
    stderr: &mut E,
    interrupt: I,
) -> Result<ExitStatus, SessionError>
where
    S: EventSource,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut status = None;

    loop {
        let step = tokio::select! {
            biased;
            () = &mut interrupt, if status.is_none() => Step::Interrupted,
            event = source.next_event() => Step::Event(event),
        };

        match step {
            Step::Interrupted => {
                debug!("interrupt received; closing remote channel");
                if let Err(err) = source.abort().await {
                    warn!(error = %err, "failed to close remote channel after interrupt");
                }
                flush(stdout).await?;
                flush(stderr).await?;
                return Ok(ExitStatus::Interrupted);
            }
            Step::Event(Some(ChannelEvent::Stdout(data))) => forward(stdout, &data).await?,
            Step::Event(Some(ChannelEvent::Stderr(data))) => forward(stderr, &data).await?,
            Step::Event(Some(ChannelEvent::Exited(code))) => {
                status = Some(ExitStatus::Exited(code));
            }
            Step::Event(Some(ChannelEvent::Signalled { signal, code })) => {
                status = Some(ExitStatus::Signalled { signal, code });
            }
            Step::Event(Some(ChannelEvent::Eof)) => {}
            Step::Event(Some(ChannelEvent::Closed) | None) => break,
        }
    }

    flush(stdout).await?;
    flush(stderr).await?;
    status.ok_or(SessionError::ConnectionLost)
}

async fn forward<W: AsyncWrite + Unpin>(sink: &mut W, data: &[u8]) -> Result<(), SessionError> {
    sink.write_all(data)
        .await
        .map_err(|err| SessionError::local_io(&err))?;
    flush(sink).await
}

async fn flush<W: AsyncWrite + Unpin>(sink: &mut W) -> Result<(), SessionError> {
    sink.flush().await.map_err(|err| SessionError::local_io(&err))
}


#[cfg(test)]
mod tests {
    use std::fmt::Write as _;
    use std::time::Duration;

    use rstest::rstest;
    use tokio::time::{sleep, timeout};

    use super::scripted::ScriptedSource;
    use super::*;

    fn out(text: &str) -> ChannelEvent {
        ChannelEvent::Stdout(text.as_bytes().to_vec())
    }

    fn err(text: &str) -> ChannelEvent {
        ChannelEvent::Stderr(text.as_bytes().to_vec())
    }

    async fn run_script(
        source: &mut ScriptedSource,
    ) -> (Result<ExitStatus, SessionError>, String, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = relay(source, &mut stdout, &mut stderr, std::future::pending()).await;
        (
            result,
            String::from_utf8(stdout).expect("stdout utf8"),
            String::from_utf8(stderr).expect("stderr utf8"),
        )
    }

    #[rstest]
    #[case(0)]
    #[case(7)]
    #[case(255)]
    #[tokio::test]
    async fn relay_preserves_remote_exit_status(#[case] code: u32) {
        let mut source =
            ScriptedSource::new([ChannelEvent::Exited(code), ChannelEvent::Eof, ChannelEvent::Closed]);

        let (result, stdout, stderr) = run_script(&mut source).await;

        assert_eq!(result, Ok(ExitStatus::Exited(code)));
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[tokio::test]
    async fn relay_forwards_echo_output_to_stdout() {
        let mut source =
            ScriptedSource::new([out("hello\n"), ChannelEvent::Exited(0), ChannelEvent::Closed]);

        let (result, stdout, _) = run_script(&mut source).await;

        assert_eq!(result, Ok(ExitStatus::Exited(0)));
        assert!(stdout.contains("hello"), "stdout: {stdout}");
    }

    #[tokio::test]
    async fn relay_returns_nonzero_status_without_error() {
        let mut source = ScriptedSource::new([ChannelEvent::Exited(1), ChannelEvent::Closed]);

        let (result, _, _) = run_script(&mut source).await;

        let status = result.expect("non-zero exit is not an error");
        assert_eq!(status.code(), 1);
    }

    #[tokio::test]
    async fn relay_routes_interleaved_markers_to_matching_sinks() {
        let mut events = Vec::new();
        let mut expected_out = String::new();
        let mut expected_err = String::new();
        for i in 1..=20 {
            let out_marker = format!("out-{i:03}\n");
            let err_marker = format!("err-{i:03}\n");
            expected_out.push_str(&out_marker);
            expected_err.push_str(&err_marker);
            events.push(out(&out_marker));
            events.push(err(&err_marker));
        }
        events.push(ChannelEvent::Exited(0));
        events.push(ChannelEvent::Closed);
        let mut source = ScriptedSource::new(events);

        let (result, stdout, stderr) = run_script(&mut source).await;

        assert_eq!(result, Ok(ExitStatus::Exited(0)));
        assert_eq!(stdout, expected_out);
        assert_eq!(stderr, expected_err);
    }

    #[tokio::test]
    async fn relay_drains_output_that_arrives_after_exit_status() {
        let mut source = ScriptedSource::new([
            out("before\n"),
            ChannelEvent::Exited(3),
            out("after\n"),
            err("late\n"),
            ChannelEvent::Eof,
            ChannelEvent::Closed,
        ]);

        let (result, stdout, stderr) = run_script(&mut source).await;

        assert_eq!(result, Ok(ExitStatus::Exited(3)));
        assert_eq!(stdout, "before\nafter\n");
        assert_eq!(stderr, "late\n");
    }

    #[tokio::test]
    async fn relay_reports_signal_termination() {
        let mut source = ScriptedSource::new([
            ChannelEvent::Signalled {
                signal: String::from("KILL"),
                code: 137,
            },
            ChannelEvent::Closed,
        ]);

        let (result, _, _) = run_script(&mut source).await;

        assert_eq!(result.map(|status| status.code()), Ok(137));
    }

    #[tokio::test]
    async fn relay_distinguishes_lost_connection_from_exit_status() {
        let mut source = ScriptedSource::new([out("partial\n")]);

        let (result, stdout, _) = run_script(&mut source).await;

        assert_eq!(result, Err(SessionError::ConnectionLost));
        assert_eq!(stdout, "partial\n");
    }

    #[tokio::test]
    async fn relay_returns_promptly_when_interrupted() {
        let mut source = ScriptedSource::stalling([out("running\n")]);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let result = timeout(
            Duration::from_secs(5),
            relay(
                &mut source,
                &mut stdout,
                &mut stderr,
                sleep(Duration::from_millis(50)),
            ),
        )
        .await
        .expect("relay should return shortly after the interrupt");

        assert_eq!(result, Ok(ExitStatus::Interrupted));
        assert_eq!(result.map(|status| status.code()), Ok(1));
        assert!(source.aborted, "channel should be closed on interrupt");
        assert_eq!(stdout, b"running\n");
    }

    #[tokio::test]
    async fn relay_ignores_interrupt_once_status_is_known() {
        let mut source = ScriptedSource::new([ChannelEvent::Exited(0), out("tail\n")]);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let result = relay(
            &mut source,
            &mut stdout,
            &mut stderr,
            sleep(Duration::from_millis(0)),
        )
        .await;

        // The zero-length sleep may win the first race; the status must still be
        // reported faithfully when it arrives before the interrupt is observed.
        match result {
            Ok(ExitStatus::Exited(0)) => assert!(!source.aborted),
            Ok(ExitStatus::Interrupted) => assert!(source.aborted),
            other => panic!("unexpected relay result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn relay_handles_large_output_without_loss() {
        let mut expected = String::new();
        let mut events = Vec::new();
        for i in 0..2_000 {
            let line = format!("line {i}\n");
            write!(&mut expected, "{line}").expect("write expected");
            events.push(out(&line));
        }
        events.push(ChannelEvent::Exited(0));
        let mut source = ScriptedSource::new(events);

        let (result, stdout, _) = run_script(&mut source).await;

        assert_eq!(result, Ok(ExitStatus::Exited(0)));
        assert_eq!(stdout, expected);
    }
}

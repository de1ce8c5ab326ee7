//! Adapter from `russh` channel messages to relay events.

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};
use tracing::debug;

use super::error::SessionError;
use super::relay::{ChannelEvent, EventSource};
use super::types::UNKNOWN_EXIT_CODE;

/// SSH extended data type code for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

impl EventSource for Channel<Msg> {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            let message = self.wait().await?;
            if let Some(event) = event_from_message(message) {
                return Some(event);
            }
        }
    }

    async fn abort(&mut self) -> Result<(), SessionError> {
        self.close()
            .await
            .map_err(|err| SessionError::Channel(err.to_string()))
    }
}

fn event_from_message(message: ChannelMsg) -> Option<ChannelEvent> {
    match message {
        ChannelMsg::Data { data } => Some(ChannelEvent::Stdout(data.to_vec())),
        ChannelMsg::ExtendedData { data, ext } => {
            if ext != SSH_EXTENDED_DATA_STDERR {
                debug!(ext, "relaying unknown extended data type as stderr");
            }
            Some(ChannelEvent::Stderr(data.to_vec()))
        }
        ChannelMsg::ExitStatus { exit_status } => Some(ChannelEvent::Exited(exit_status)),
        ChannelMsg::ExitSignal { signal_name, .. } => Some(ChannelEvent::Signalled {
            code: signal_exit_code(&signal_name),
            signal: signal_label(&signal_name),
        }),
        ChannelMsg::Eof => Some(ChannelEvent::Eof),
        ChannelMsg::Close => Some(ChannelEvent::Closed),
        _ => None,
    }
}

/// Maps a signal to the `128 + n` status a POSIX shell would report.
fn signal_exit_code(signal: &Sig) -> i32 {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => return UNKNOWN_EXIT_CODE,
    };
    128 + number
}

fn signal_label(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Sig::INT, 130)]
    #[case(Sig::KILL, 137)]
    #[case(Sig::TERM, 143)]
    #[case(Sig::Custom(String::from("WINCH")), UNKNOWN_EXIT_CODE)]
    fn signals_map_to_shell_style_codes(#[case] signal: Sig, #[case] expected: i32) {
        assert_eq!(signal_exit_code(&signal), expected);
    }

    fn signal(name: Sig) -> ChannelMsg {
        ChannelMsg::ExitSignal {
            signal_name: name,
            core_dumped: false,
            error_message: String::new(),
            lang_tag: String::new(),
        }
    }

    #[rstest]
    #[case::stdout(
        ChannelMsg::Data { data: b"out".to_vec().into() },
        Some(ChannelEvent::Stdout(b"out".to_vec()))
    )]
    #[case::stderr(
        ChannelMsg::ExtendedData { data: b"err".to_vec().into(), ext: 1 },
        Some(ChannelEvent::Stderr(b"err".to_vec()))
    )]
    #[case::unknown_extended_type(
        ChannelMsg::ExtendedData { data: b"odd".to_vec().into(), ext: 7 },
        Some(ChannelEvent::Stderr(b"odd".to_vec()))
    )]
    #[case::exit_status(ChannelMsg::ExitStatus { exit_status: 7 }, Some(ChannelEvent::Exited(7)))]
    #[case::exit_signal(
        signal(Sig::TERM),
        Some(ChannelEvent::Signalled { signal: String::from("TERM"), code: 143 })
    )]
    #[case::eof(ChannelMsg::Eof, Some(ChannelEvent::Eof))]
    #[case::close(ChannelMsg::Close, Some(ChannelEvent::Closed))]
    #[case::window_adjust(ChannelMsg::WindowAdjusted { new_size: 1024 }, None)]
    #[case::success(ChannelMsg::Success, None)]
    fn channel_messages_map_to_relay_events(
        #[case] message: ChannelMsg,
        #[case] expected: Option<ChannelEvent>,
    ) {
        assert_eq!(event_from_message(message), expected);
    }

    #[test]
    fn custom_signal_keeps_its_name() {
        assert_eq!(signal_label(&Sig::Custom(String::from("WINCH"))), "WINCH");
    }
}

//! JSON-lines rendering of link events.

use serde::Serialize;

use telecam_core::{Command, LinkEndpoint, LinkEvent, StreamStats};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord<'a> {
    Established {
        endpoint: &'a LinkEndpoint,
    },
    Frame {
        sequence: u64,
        width: u32,
        height: u32,
        /// Time from frame completion to this record.
        latency_us: u128,
    },
    CommandSent {
        command: Command,
    },
    CommandFailed {
        command: Command,
        error: &'a str,
    },
    Failed {
        task: &'static str,
        error: &'a str,
    },
    Closed {
        error: Option<&'a str>,
    },
    Stats(&'a StreamStats),
}

impl<'a> From<&'a LinkEvent> for EventRecord<'a> {
    fn from(event: &'a LinkEvent) -> Self {
        match event {
            LinkEvent::Established(endpoint) => EventRecord::Established { endpoint },
            LinkEvent::FrameReady(frame) => EventRecord::Frame {
                sequence: frame.sequence,
                width: frame.width(),
                height: frame.height(),
                latency_us: frame.completed_at.elapsed().as_micros(),
            },
            LinkEvent::CommandSent(command) => EventRecord::CommandSent { command: *command },
            LinkEvent::CommandFailed { command, error } => EventRecord::CommandFailed {
                command: *command,
                error,
            },
            LinkEvent::Failed { task, error } => EventRecord::Failed { task: *task, error },
            LinkEvent::Closed { error } => EventRecord::Closed {
                error: error.as_deref(),
            },
        }
    }
}

impl EventRecord<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecam_core::Opcode;

    #[test]
    fn established_record() {
        let event = LinkEvent::Established(LinkEndpoint::Udp {
            local: "0.0.0.0:5000".parse().unwrap(),
            remote: "192.168.1.88:8088".parse().unwrap(),
        });
        let json = EventRecord::from(&event).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"event":"established","endpoint":{"transport":"udp","local":"0.0.0.0:5000","remote":"192.168.1.88:8088"}}"#
        );
    }

    #[test]
    fn command_records() {
        let sent = LinkEvent::CommandSent(Command::with_param(Opcode::TurnLeft, 20));
        assert_eq!(
            EventRecord::from(&sent).to_json().unwrap(),
            r#"{"event":"command_sent","command":{"opcode":"turn_left","param":20}}"#
        );

        let failed = LinkEvent::CommandFailed {
            command: Command::stop_stream(),
            error: "unplugged".into(),
        };
        assert_eq!(
            EventRecord::from(&failed).to_json().unwrap(),
            r#"{"event":"command_failed","command":{"opcode":"stop_stream"},"error":"unplugged"}"#
        );
    }

    #[test]
    fn closed_record() {
        let closed = LinkEvent::Closed { error: None };
        assert_eq!(
            EventRecord::from(&closed).to_json().unwrap(),
            r#"{"event":"closed","error":null}"#
        );
    }

    #[test]
    fn stats_record_is_flattened() {
        let stats = StreamStats {
            frames_completed: 3,
            ..Default::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&EventRecord::Stats(&stats).to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "stats");
        assert_eq!(value["frames_completed"], 3);
        assert_eq!(value["frames_dropped"], 0);
    }
}

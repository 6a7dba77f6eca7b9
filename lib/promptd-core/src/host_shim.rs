//! Line-oriented bridge for hosts that deliver prompt events over a pipe. Each line is
//! one JSON object:
//!
//! ```text
//! {"type":"request","caller":{"bundle":"com.example"},"session_id":1,"notify_kind":"dialog"}
//! {"type":"cancel","caller":{"bundle":"com.example"},"session_id":1}
//! {"type":"display","width":2224,"height":2496}
//! {"type":"shutdown"}
//! ```
//!
//! Requesters are answered the same way on stdout:
//!
//! ```text
//! {"type":"dismissed","caller":{"bundle":"com.example"},"session_id":1}
//! {"type":"failed","caller":{"uid":20010},"session_id":null,"reason":"Host is terminating"}
//! ```

use crate::platform::{Bounds, EventDispatcher, HostEvent, RequesterNotice, RequesterNotifier};
use crate::request::Request;
use crate::surface_key::{CallerIdentity, SurfaceKey};
use log::{debug, error, warn};
use serde::Deserialize;
use std::io::{Stdout, Write};
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShimCommand {
    Request(Request),
    Cancel {
        caller: CallerIdentity,
        #[serde(default)]
        session_id: Option<u64>,
    },
    Display {
        #[serde(default)]
        left: i32,
        #[serde(default)]
        top: i32,
        width: u32,
        height: u32,
    },
    Shutdown,
}

impl From<ShimCommand> for HostEvent {
    fn from(command: ShimCommand) -> Self {
        match command {
            ShimCommand::Request(request) => HostEvent::Request(request),
            ShimCommand::Cancel { caller, session_id } => {
                HostEvent::Cancel(SurfaceKey::new(caller, session_id))
            }
            ShimCommand::Display {
                left,
                top,
                width,
                height,
            } => HostEvent::DisplayChanged(Bounds::new(left, top, width, height)),
            ShimCommand::Shutdown => HostEvent::Shutdown,
        }
    }
}

/// Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<HostEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let command: ShimCommand = serde_json::from_str(line)?;
    Ok(Some(command.into()))
}

/// Forwards every parsable line to the event loop until the reader is exhausted.
pub async fn forward_lines<R>(reader: R, dispatcher: EventDispatcher)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(Some(event)) => dispatcher.send(event),
                Ok(None) => {}
                Err(e) => warn!("Ignoring malformed command: {e}"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Could not read host command: {e}");
                break;
            }
        }
    }
    debug!("Host command stream closed");
}

pub async fn forward_stdin(dispatcher: EventDispatcher) {
    forward_lines(tokio::io::BufReader::new(tokio::io::stdin()), dispatcher).await;
}

/// Writes each notice as one JSON line.
pub struct JsonLineNotifier<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLineNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JsonLineNotifier<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> RequesterNotifier for JsonLineNotifier<W> {
    fn notify(&self, notice: &RequesterNotice) {
        let line = match serde_json::to_string(notice) {
            Ok(line) => line,
            Err(e) => {
                error!("Could not encode requester notice: {e}");
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!("Could not notify requester: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventBridge;
    use crate::request::{GeometryHint, SurfaceKind};

    #[test]
    fn test_parse_request() {
        let line = r#"{"type":"request","caller":{"bundle":"com.example"},"session_id":3,
            "geometry_hint":{"left":0,"top":100,"width":1000,"height":900},
            "content":{"params":{"group":"LOCATION"}},"notify_kind":"toast"}"#
            .replace('\n', "");

        match parse_line(&line).unwrap() {
            Some(HostEvent::Request(request)) => {
                assert_eq!(request.key(), SurfaceKey::bundle("com.example").with_session(3));
                assert_eq!(
                    request.geometry_hint,
                    Some(GeometryHint::new(0, 100, 1000, 900))
                );
                assert_eq!(request.kind(), SurfaceKind::Toast);
                assert_eq!(
                    request.content.params.get("group").map(String::as_str),
                    Some("LOCATION")
                );
                assert_eq!(request.content.page, None);
            }
            other => panic!("Expected a request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_minimal_request() {
        match parse_line(r#"{"type":"request","caller":{"uid":20010}}"#).unwrap() {
            Some(HostEvent::Request(request)) => {
                assert_eq!(request.key(), SurfaceKey::uid(20010));
                assert_eq!(request.geometry_hint, None);
                assert_eq!(request.kind(), SurfaceKind::Dialog);
            }
            other => panic!("Expected a request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cancel_display_shutdown() {
        match parse_line(r#"{"type":"cancel","caller":{"uid":5}}"#).unwrap() {
            Some(HostEvent::Cancel(key)) => assert_eq!(key, SurfaceKey::uid(5)),
            other => panic!("Expected a cancel, got {:?}", other),
        }
        match parse_line(r#"{"type":"display","width":2224,"height":2496}"#).unwrap() {
            Some(HostEvent::DisplayChanged(bounds)) => {
                assert_eq!(bounds, Bounds::new(0, 0, 2224, 2496))
            }
            other => panic!("Expected a display change, got {:?}", other),
        }
        assert!(matches!(
            parse_line(r#"{"type":"shutdown"}"#).unwrap(),
            Some(HostEvent::Shutdown)
        ));
    }

    #[test]
    fn test_blank_and_malformed_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line(r#"{"type":"explode"}"#).is_err());
        assert!(parse_line("not json").is_err());
    }

    #[test]
    fn test_notices_are_json_lines() {
        let notifier = JsonLineNotifier::new(Vec::new());
        notifier.notify(&RequesterNotice::dismissed(
            &SurfaceKey::bundle("com.example").with_session(1),
        ));
        notifier.notify(&RequesterNotice::failed(
            &SurfaceKey::uid(20010),
            "Host is terminating",
        ));

        let out = String::from_utf8(notifier.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(
            lines,
            vec![
                serde_json::json!({
                    "type": "dismissed",
                    "caller": {"bundle": "com.example"},
                    "session_id": 1
                }),
                serde_json::json!({
                    "type": "failed",
                    "caller": {"uid": 20010},
                    "session_id": null,
                    "reason": "Host is terminating"
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_forward_lines_skips_garbage() {
        let mut bridge = EventBridge::new();
        let input = b"garbage\n\n{\"type\":\"cancel\",\"caller\":{\"uid\":1}}\n{\"type\":\"shutdown\"}\n";

        forward_lines(&input[..], bridge.dispatcher()).await;

        assert!(matches!(
            bridge.next_event().await,
            Some(HostEvent::Cancel(_))
        ));
        assert!(matches!(
            bridge.next_event().await,
            Some(HostEvent::Shutdown)
        ));
    }
}

use std::{fmt::Display, pin::Pin};

use futures::{Stream, StreamExt};
use serde::Deserialize;

use kite_core::{WatchError, WatchEvent};
use kite_model::{Resource, ResourceKind};

use crate::source::lines::LineDecoder;

/// One line of a watch response.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    object: serde_json::Value,
}

/// `Status` object returned for failed requests and `ERROR` frames.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiStatus {
    pub code: u16,
    pub message: String,
    pub reason: String,
}

impl ApiStatus {
    pub(crate) fn into_error(self, http_code: u16) -> WatchError {
        let code = if self.code == 0 { http_code } else { self.code };
        let message = if self.message.is_empty() {
            self.reason
        } else {
            self.message
        };
        match code {
            401 | 403 => WatchError::Unauthorized(message),
            410 => WatchError::Expired,
            _ if is_expired_message(&message) => WatchError::Expired,
            _ => WatchError::Status { code, message },
        }
    }
}

fn is_expired_message(message: &str) -> bool {
    message.contains("too old resource version")
}

fn decode_object(kind: ResourceKind, object: serde_json::Value) -> Result<Resource, WatchError> {
    Resource::decode(kind, object).map_err(|e| WatchError::Decode(e.to_string()))
}

pub(crate) fn decode_frame(line: &[u8], kind: ResourceKind) -> Result<WatchEvent, WatchError> {
    let frame: Frame =
        serde_json::from_slice(line).map_err(|e| WatchError::Decode(format!("watch frame: {e}")))?;
    match frame.kind.as_str() {
        "ADDED" => decode_object(kind, frame.object).map(WatchEvent::Added),
        "MODIFIED" => decode_object(kind, frame.object).map(WatchEvent::Modified),
        "DELETED" => decode_object(kind, frame.object).map(WatchEvent::Deleted),
        "BOOKMARK" => frame
            .object
            .pointer("/metadata/resourceVersion")
            .and_then(serde_json::Value::as_str)
            .map(|rv| WatchEvent::Bookmark(rv.to_string()))
            .ok_or_else(|| WatchError::Decode("bookmark without resourceVersion".into())),
        "ERROR" => {
            let status: ApiStatus = serde_json::from_value(frame.object).unwrap_or_default();
            Err(status.into_error(0))
        }
        other => Err(WatchError::Decode(format!("unknown watch event type {other:?}"))),
    }
}

struct FrameState<S> {
    bytes: Pin<Box<S>>,
    lines: LineDecoder,
    ended: bool,
}

/// Turn a chunked response body into watch events.
///
/// The stream ends after the first error or when the body ends.
pub(crate) fn frames<S, B, E>(
    bytes: S,
    kind: ResourceKind,
) -> impl Stream<Item = Result<WatchEvent, WatchError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    frames_with(bytes, kind, LineDecoder::default())
}

fn frames_with<S, B, E>(
    bytes: S,
    kind: ResourceKind,
    lines: LineDecoder,
) -> impl Stream<Item = Result<WatchEvent, WatchError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = FrameState {
        bytes: Box::pin(bytes),
        lines,
        ended: false,
    };
    futures::stream::unfold(state, move |mut st| async move {
        loop {
            let line = match st.lines.next_line() {
                Some(line) => Some(line),
                None if st.ended => st.lines.finish(),
                None => None,
            };
            if let Some(line) = line {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let item = decode_frame(&line, kind);
                if item.is_err() {
                    st.ended = true;
                    st.lines.clear();
                }
                return Some((item, st));
            }
            if st.ended {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = st.lines.push(chunk.as_ref()) {
                        st.ended = true;
                        return Some((Err(e), st));
                    }
                }
                Some(Err(e)) => {
                    st.ended = true;
                    st.lines.clear();
                    return Some((Err(WatchError::Connect(e.to_string())), st));
                }
                None => st.ended = true,
            }
        }
    })
}

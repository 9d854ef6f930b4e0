//! SSE plumbing for streaming adapters.
//!
//! Receive a `reqwest::Response`, buffer chunks, split on `\n\n`, extract
//! `data:` payloads, and hand each payload to an adapter-specific parser.

use crate::util::from_reqwest;
use cl_domain::error::Result;
use cl_domain::stream::BoxStream;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Consumed bytes are drained in place; a trailing partial event stays in
/// the buffer for the next call. `event:`, `id:` and `retry:` lines are
/// ignored.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE response and a parser closure.
///
/// The closure maps one `data:` payload to zero or more items. The remaining
/// buffer is flushed when the body closes; a transport error ends the
/// stream after yielding it.
pub(crate) fn sse_response_stream<T, F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: FnMut(&str) -> Vec<Result<T>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for item in parse_data(&data) {
                            yield item;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for item in parse_data(&data) {
                                yield item;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_consecutive_events() {
        let mut buf = String::from("data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn keeps_partial_event_for_next_chunk() {
        let mut buf = String::from("data: first\n\ndata: sec");
        assert_eq!(drain_data_lines(&mut buf), vec!["first"]);
        assert_eq!(buf, "data: sec");

        buf.push_str("ond\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["second"]);
    }

    #[test]
    fn ignores_metadata_and_blank_data() {
        let mut buf = String::from(": keep-alive\nevent: x\nid: 7\ndata: \n\ndata: [DONE]\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["[DONE]"]);
    }
}

use anyhow::Result;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use super::buffering::CircularLineBuffer;
use crate::StreamEvent;

/// Strategy for turning one SSE `data:` payload into stream events
pub trait SseLineParser: Send {
    /// Parse a data line into stream events
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>>;

    /// Check if this line signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Parse an SSE body into provider-agnostic events.
///
/// Generic over the byte stream so it can be driven by a `reqwest` response
/// or by an in-memory stream in tests. Non-`data:` lines are ignored.
pub fn parse_sse_stream<S, B, E, P>(
    byte_stream: S,
    parser: P,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(byte_stream);
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut finished = false;

        'outer: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes.as_ref());

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => {
                                let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
                                    continue;
                                };
                                if parser.is_done_marker(data) {
                                    if !finished {
                                        yield Ok(StreamEvent::Done { finish_reason: None });
                                    }
                                    finished = true;
                                    break 'outer;
                                }
                                match parser.parse_data_line(data) {
                                    Ok(events) => {
                                        for event in events {
                                            if matches!(event, StreamEvent::Done { .. }) {
                                                if finished {
                                                    continue;
                                                }
                                                finished = true;
                                            }
                                            yield Ok(event);
                                        }
                                    }
                                    Err(e) => yield Err(e),
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    break;
                }
            }
        }

        if !finished {
            if let Some(Ok(line)) = buffer.take_remainder() {
                if let Some(data) = line.strip_prefix("data:").map(str::trim_start) {
                    if !parser.is_done_marker(data) {
                        match parser.parse_data_line(data) {
                            Ok(events) => {
                                for event in events {
                                    if matches!(event, StreamEvent::Done { .. }) {
                                        finished = true;
                                    }
                                    yield Ok(event);
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
            }
            if !finished {
                yield Ok(StreamEvent::Done { finish_reason: None });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoParser;

    impl SseLineParser for EchoParser {
        fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
            Ok(vec![StreamEvent::Message { content: data.to_string() }])
        }
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<Vec<u8>, String>> {
        futures::stream::iter(parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_parses_data_lines_and_stops_at_done() {
        let stream = parse_sse_stream(
            chunks(&["event: x\ndata: hel", "lo\n\ndata: world\n", "data: [DONE]\ndata: ignored\n"]),
            EchoParser,
        );
        let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Message { content: "hello".into() },
                StreamEvent::Message { content: "world".into() },
                StreamEvent::Done { finish_reason: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_body_without_done_marker_still_finishes() {
        let stream = parse_sse_stream(chunks(&["data: tail"]), EchoParser);
        let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text(), Some("tail"));
        assert_eq!(events[1], StreamEvent::Done { finish_reason: None });
    }
}

//! Line-delimited event framing shared by producer and consumer.
//!
//! Every unit on the wire is `data: <payload>\n\n`. Payloads are literal token
//! text, the terminal `[DONE]` marker, or `[ERROR] <diagnostic>`. Lines starting
//! with `:` are SSE comments and carry keepalives.

use crate::error::ProtocolError;

pub const DATA_PREFIX: &str = "data:";
pub const DELIMITER: &str = "\n\n";
pub const DONE_MARKER: &str = "[DONE]";
pub const ERROR_MARKER: &str = "[ERROR]";

/// Max characters of a malformed frame kept in a `ProtocolError`.
const MALFORMED_PREVIEW_CHARS: usize = 40;

/// One decoded event of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Token(String),
    Done,
    Error(String),
    Keepalive,
}

impl FrameEvent {
    /// Encode this event as a complete wire frame, delimiter included.
    pub fn encode(&self) -> String {
        match self {
            FrameEvent::Token(token) => format!("data: {token}{DELIMITER}"),
            FrameEvent::Done => format!("data: {DONE_MARKER}{DELIMITER}"),
            FrameEvent::Error(diagnostic) => {
                format!("data: {ERROR_MARKER} {diagnostic}{DELIMITER}")
            }
            FrameEvent::Keepalive => format!(": keepalive{DELIMITER}"),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameEvent::Done | FrameEvent::Error(_))
    }
}

/// Interpret a single frame with its delimiter already removed.
pub fn parse_frame(raw: &str) -> Result<FrameEvent, ProtocolError> {
    if raw.starts_with(':') {
        return Ok(FrameEvent::Keepalive);
    }

    let Some(rest) = raw.strip_prefix(DATA_PREFIX) else {
        let preview: String = raw.chars().take(MALFORMED_PREVIEW_CHARS).collect();
        return Err(ProtocolError::MissingDataPrefix(preview));
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    if payload.is_empty() {
        Err(ProtocolError::EmptyPayload)
    } else if payload == DONE_MARKER {
        Ok(FrameEvent::Done)
    } else if let Some(diagnostic) = payload.strip_prefix(ERROR_MARKER) {
        Ok(FrameEvent::Error(diagnostic.trim().to_string()))
    } else {
        Ok(FrameEvent::Token(payload.to_string()))
    }
}

/// Incremental splitter: feed decoded text as it arrives, get back every
/// complete frame, keep the incomplete tail for the next push.
///
/// A run of `k >= 2` newlines closes a frame: the last two are the delimiter,
/// the first `k - 2` belong to the payload. When a token frame's run reaches
/// the end of the input seen so far, newlines at the head of the next push
/// still belong to that token and come back as a continuation token.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    open_token: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and drain all complete frames, in arrival order.
    pub fn push(&mut self, text: &str) -> Vec<Result<FrameEvent, ProtocolError>> {
        self.buffer.push_str(text);

        let mut frames = Vec::new();
        let mut start = 0;

        if self.open_token {
            let run = self.buffer.len() - self.buffer.trim_start_matches('\n').len();
            if run > 0 {
                frames.push(Ok(FrameEvent::Token("\n".repeat(run))));
            }
            start = run;
            self.open_token = run == self.buffer.len();
        }

        while let Some(offset) = self.buffer[start..].find(DELIMITER) {
            let run_start = start + offset;
            let run_end = self.buffer[run_start..]
                .find(|c: char| c != '\n')
                .map_or(self.buffer.len(), |i| run_start + i);

            let raw = &self.buffer[start..run_end - DELIMITER.len()];
            if !raw.is_empty() {
                let frame = parse_frame(raw);
                self.open_token = run_end == self.buffer.len()
                    && matches!(
                        frame,
                        Ok(FrameEvent::Token(_)) | Err(ProtocolError::EmptyPayload)
                    );
                frames.push(frame);
            }
            start = run_end;
        }
        self.buffer.drain(..start);

        frames
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Signal end of input. A leftover fragment is reported, not interpreted.
    pub fn finish(&mut self) -> Option<ProtocolError> {
        self.open_token = false;
        let leftover = std::mem::take(&mut self.buffer);
        if leftover.is_empty() {
            None
        } else {
            Some(ProtocolError::Truncated(leftover.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf8::Utf8Decoder;

    fn encode_all(tokens: &[&str]) -> String {
        let mut wire: String = tokens
            .iter()
            .map(|t| FrameEvent::Token(t.to_string()).encode())
            .collect();
        wire.push_str(&FrameEvent::Done.encode());
        wire
    }

    /// Collect token payloads up to (not including) the first terminal event.
    fn tokens_until_done(events: Vec<Result<FrameEvent, ProtocolError>>) -> Vec<String> {
        let mut tokens = Vec::new();
        for event in events {
            match event {
                Ok(FrameEvent::Token(t)) => tokens.push(t),
                Ok(e) if e.is_terminal() => break,
                _ => {}
            }
        }
        tokens
    }

    #[test]
    fn test_encode_token_frame() {
        assert_eq!(FrameEvent::Token("Hel".into()).encode(), "data: Hel\n\n");
        assert_eq!(FrameEvent::Done.encode(), "data: [DONE]\n\n");
        assert_eq!(
            FrameEvent::Error("boom".into()).encode(),
            "data: [ERROR] boom\n\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_order_and_drops_done() {
        let tokens = ["Hello", ",", " world", " 👋", "  spaced", "a\nb"];
        let mut parser = FrameParser::new();
        let decoded = tokens_until_done(parser.push(&encode_all(&tokens)));
        assert_eq!(decoded, tokens);
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn test_leading_space_of_token_is_kept() {
        let mut parser = FrameParser::new();
        let events = parser.push("data:  world\n\n");
        assert_eq!(events, vec![Ok(FrameEvent::Token(" world".into()))]);
    }

    #[test]
    fn test_fragment_is_carried_between_pushes() {
        let mut parser = FrameParser::new();
        assert!(parser.push("data: Hel").is_empty());
        assert!(parser.push("lo\n").is_empty());
        assert_eq!(parser.pending(), "data: Hello\n");
        let events = parser.push("\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![Ok(FrameEvent::Token("Hello".into())), Ok(FrameEvent::Done)]
        );
    }

    #[test]
    fn test_every_split_point_yields_same_tokens() {
        let tokens = ["Grüße", " aus ", "東京", " 🚀", "!"];
        let wire = encode_all(&tokens);
        let bytes = wire.as_bytes();

        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut parser = FrameParser::new();
            let mut events = parser.push(&decoder.decode(&bytes[..split]));
            events.extend(parser.push(&decoder.decode(&bytes[split..])));
            assert_eq!(tokens_until_done(events), tokens, "split at byte {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let tokens = ["naïve", " café", " ✓"];
        let wire = encode_all(&tokens);

        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::new();
        let mut events = Vec::new();
        for byte in wire.as_bytes() {
            events.extend(parser.push(&decoder.decode(std::slice::from_ref(byte))));
        }
        assert_eq!(tokens_until_done(events), tokens);
    }

    #[test]
    fn test_error_marker_carries_diagnostic() {
        assert_eq!(
            parse_frame("data: [ERROR] upstream timed out"),
            Ok(FrameEvent::Error("upstream timed out".into()))
        );
        assert_eq!(parse_frame("data: [ERROR]"), Ok(FrameEvent::Error(String::new())));
    }

    #[test]
    fn test_malformed_frames_are_reported_not_fatal() {
        let mut parser = FrameParser::new();
        let events = parser.push("garbage\n\ndata: ok\n\ndata: \n\n: keepalive\n\n");
        assert!(matches!(events[0], Err(ProtocolError::MissingDataPrefix(_))));
        assert_eq!(events[1], Ok(FrameEvent::Token("ok".into())));
        assert_eq!(events[2], Err(ProtocolError::EmptyPayload));
        assert_eq!(events[3], Ok(FrameEvent::Keepalive));
    }

    #[test]
    fn test_newline_tokens_round_trip() {
        let tokens = ["Line one.", "\n", "Line two", ".\n", "- item", "\n", "\n", "end"];
        let mut parser = FrameParser::new();
        assert_eq!(tokens_until_done(parser.push(&encode_all(&tokens))), tokens);
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn test_newline_tokens_survive_every_split_point() {
        let tokens = ["line\n", "\n", "next", "\n", "- ünïcode\n", "tail"];
        let expected: String = tokens.concat();
        let wire = encode_all(&tokens);
        let bytes = wire.as_bytes();

        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut parser = FrameParser::new();
            let mut events = parser.push(&decoder.decode(&bytes[..split]));
            events.extend(parser.push(&decoder.decode(&bytes[split..])));
            assert_eq!(
                tokens_until_done(events).concat(),
                expected,
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_trailing_newlines_arriving_late_continue_the_token() {
        let mut parser = FrameParser::new();
        assert_eq!(
            parser.push("data: line\n\n"),
            vec![Ok(FrameEvent::Token("line".into()))]
        );
        assert_eq!(
            parser.push("\ndata: [DONE]\n\n"),
            vec![Ok(FrameEvent::Token("\n".into())), Ok(FrameEvent::Done)]
        );
    }

    #[test]
    fn test_newline_after_done_is_not_a_token() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push("data: [DONE]\n\n"), vec![Ok(FrameEvent::Done)]);
        let events = parser.push("\ndata: x\n\n");
        assert!(matches!(events[0], Err(ProtocolError::MissingDataPrefix(_))));
    }

    #[test]
    fn test_finish_reports_truncated_fragment() {
        let mut parser = FrameParser::new();
        parser.push("data: [DONE]\n\ndata: partial");
        assert_eq!(parser.finish(), Some(ProtocolError::Truncated(13)));
        assert_eq!(parser.finish(), None);
    }
}

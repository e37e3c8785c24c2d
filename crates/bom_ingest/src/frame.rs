use encoding_rs::{CoderResult, Decoder, UTF_8};

use crate::FrameDecodeError;

/// Frames are separated by a blank line.
pub const FRAME_DELIMITER: &str = "\n\n";

/// One delimiter-bounded span of decoded stream text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    /// Leading line breaks left over from the delimiter are not part of the frame.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        match text.find(|c: char| c != '\n') {
            Some(0) => Self(text),
            Some(start) => Self(text[start..].to_string()),
            None => Self(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// What `flush` does with text left over after the last delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingFramePolicy {
    /// Hand the remainder back as a final frame for parsing.
    #[default]
    Parse,
    /// Drop the remainder and report it.
    Discard,
}

/// Reassembles byte chunks into frames.
///
/// Bytes go through a streaming UTF-8 decoder, so a character split across
/// chunks is decoded once both halves have arrived. `\r\n` is folded to `\n`
/// before the buffer is searched for delimiters. Output does not depend on
/// where the chunk boundaries fall.
pub struct FrameDecoder {
    decoder: Decoder,
    buffer: String,
    policy: TrailingFramePolicy,
}

impl FrameDecoder {
    pub fn new(policy: TrailingFramePolicy) -> Self {
        Self {
            decoder: UTF_8.new_decoder_with_bom_removal(),
            buffer: String::new(),
            policy,
        }
    }

    /// Decode a chunk and return every frame it completes.
    ///
    /// Malformed bytes are replaced and reported; the frames are still returned.
    pub fn feed(&mut self, chunk: &[u8]) -> (Vec<Frame>, Option<FrameDecodeError>) {
        let malformed = self.decode(chunk, false);
        let frames = self.drain_frames();
        let warning = malformed.then_some(FrameDecodeError::MalformedBytes);
        (frames, warning)
    }

    /// End of stream: finish decoding and deal with the unterminated remainder.
    ///
    /// The decoder is reset and may be reused for a new stream afterwards.
    pub fn flush(&mut self) -> Result<Option<Frame>, FrameDecodeError> {
        self.decode(&[], true);
        self.decoder = UTF_8.new_decoder_with_bom_removal();
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return Ok(None);
        }

        match self.policy {
            TrailingFramePolicy::Parse => Ok(Some(Frame::new(rest))),
            TrailingFramePolicy::Discard => Err(FrameDecodeError::UnterminatedFrame {
                len: rest.len(),
            }),
        }
    }

    /// Text received but not yet closed by a delimiter.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn decode(&mut self, mut bytes: &[u8], last: bool) -> bool {
        let mut text = String::new();
        let mut malformed = false;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len().saturating_mul(3) + 4);
            text.reserve(needed);
            let (result, read, replaced) = self.decoder.decode_to_string(bytes, &mut text, last);
            malformed |= replaced;
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
        self.push_normalized(&text);
        malformed
    }

    fn push_normalized(&mut self, text: &str) {
        let mut text = text;
        // CR at the end of the previous chunk, LF at the start of this one.
        if text.starts_with('\n') && self.buffer.ends_with('\r') {
            self.buffer.pop();
            self.buffer.push('\n');
            text = &text[1..];
        }
        if text.contains("\r\n") {
            self.buffer.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(text);
        }
    }

    fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].find(FRAME_DELIMITER) {
            let frame = Frame::new(&self.buffer[start..start + offset]);
            if !frame.as_str().trim().is_empty() {
                frames.push(frame);
            }
            start += offset + FRAME_DELIMITER.len();
        }
        self.buffer.drain(..start);
        frames
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(TrailingFramePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_of(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::default();
        let mut out = Vec::new();
        for chunk in chunks {
            let (frames, warning) = decoder.feed(chunk);
            assert_eq!(warning, None);
            out.extend(frames.into_iter().map(Frame::into_string));
        }
        if let Some(frame) = decoder.flush().unwrap() {
            out.push(frame.into_string());
        }
        out
    }

    #[test]
    fn splits_on_blank_line_and_keeps_remainder() {
        let mut decoder = FrameDecoder::default();
        let (frames, _) = decoder.feed(b"data: a\n\ndata: b\n\ndata: c");
        assert_eq!(frames, vec![Frame::new("data: a"), Frame::new("data: b")]);
        assert_eq!(decoder.pending(), "data: c");
    }

    #[test]
    fn utf8_character_split_across_chunks_survives() {
        let text = "data: {\"manufacturer\":\"Würth\"}\n\n";
        let bytes = text.as_bytes();
        let split = text.find('ü').unwrap() + 1;
        assert_eq!(
            frames_of(&[&bytes[..split], &bytes[split..]]),
            vec!["data: {\"manufacturer\":\"Würth\"}".to_string()]
        );
    }

    #[test]
    fn crlf_delimiter_split_between_cr_and_lf() {
        assert_eq!(
            frames_of(&[b"data: a\r", b"\n\r", b"\ndata: b\r\n\r\n"]),
            vec!["data: a".to_string(), "data: b".to_string()]
        );
    }

    #[test]
    fn extra_blank_lines_do_not_produce_empty_frames() {
        assert_eq!(
            frames_of(&[b"\n\ndata: a\n\n\n\n\ndata: b\n\n"]),
            vec!["data: a".to_string(), "data: b".to_string()]
        );
    }

    #[test]
    fn malformed_bytes_are_reported_but_not_fatal() {
        let mut decoder = FrameDecoder::default();
        let (frames, warning) = decoder.feed(b"data: \xff\n\ndata: ok\n\n");
        assert_eq!(warning, Some(FrameDecodeError::MalformedBytes));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_str(), "data: ok");
    }

    #[test]
    fn leading_bom_is_removed() {
        assert_eq!(
            frames_of(&[b"\xef\xbb", b"\xbfdata: a\n\n"]),
            vec!["data: a".to_string()]
        );
    }

    #[test]
    fn flush_returns_trailing_frame_under_parse_policy() {
        let mut decoder = FrameDecoder::new(TrailingFramePolicy::Parse);
        let (frames, _) = decoder.feed(b"data: a\n\ndata: tail\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.flush(), Ok(Some(Frame::new("data: tail\n"))));
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn flush_reports_trailing_frame_under_discard_policy() {
        let mut decoder = FrameDecoder::new(TrailingFramePolicy::Discard);
        let _ = decoder.feed(b"data: tail");
        assert_eq!(
            decoder.flush(),
            Err(FrameDecodeError::UnterminatedFrame { len: 10 })
        );
    }

    #[test]
    fn flush_ignores_whitespace_remainder() {
        let mut decoder = FrameDecoder::new(TrailingFramePolicy::Discard);
        let _ = decoder.feed(b"data: a\n\n \n");
        assert_eq!(decoder.flush(), Ok(None));
    }

    #[test]
    fn truncated_character_at_end_of_stream_is_replaced_on_flush() {
        let mut decoder = FrameDecoder::default();
        let (frames, warning) = decoder.feed(b"data: a\n\n\xc3");
        assert_eq!(frames.len(), 1);
        assert_eq!(warning, None);
        assert_eq!(decoder.flush(), Ok(Some(Frame::new("\u{FFFD}"))));
    }
}

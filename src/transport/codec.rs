//! Newline-delimited base64 framing for the bridged socket.
//!
//! Each fragment travels as the standard base64 encoding of its wire bytes
//! followed by `\n`. The peer shares the socket with console output, so
//! anything that is not a well-formed fragment line is surfaced as
//! [`LineFrame::Noise`] rather than an error.

use std::{fmt, io};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::fragment::{Fragment, HEADER_LEN};

/// Longest line buffered before the decoder gives up on finding its end.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Why a received line was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    /// Blank line.
    Empty,
    /// Characters or length that cannot be base64.
    Alphabet,
    /// Looked like base64 but failed strict decoding.
    Decode,
    /// Decoded to fewer bytes than a header plus one payload byte.
    Undersized,
    /// Header did not describe a valid fragment.
    Malformed,
    /// Exceeded [`MAX_LINE_LENGTH`] before a newline arrived.
    Overlong,
    /// Stream ended in the middle of a line.
    Truncated,
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Alphabet => "not base64",
            Self::Decode => "undecodable",
            Self::Undersized => "undersized",
            Self::Malformed => "malformed header",
            Self::Overlong => "overlong",
            Self::Truncated => "truncated",
        })
    }
}

/// One decoded line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineFrame {
    Fragment(Fragment),
    Noise(NoiseKind),
}

/// Codec turning socket bytes into [`LineFrame`]s and fragments into lines.
#[derive(Clone, Debug, Default)]
pub struct LineCodec {
    discarding: bool,
}

impl LineCodec {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

/// Whether `line` is plausibly standard padded base64.
///
/// The length must be a multiple of four and every character must come from
/// the standard alphabet, with at most two trailing `=`.
#[must_use]
pub fn looks_like_base64(line: &[u8]) -> bool {
    if line.is_empty() || line.len() % 4 != 0 {
        return false;
    }
    let body_len = line.iter().rposition(|&b| b != b'=').map_or(0, |i| i + 1);
    if body_len == 0 || line.len() - body_len > 2 {
        return false;
    }
    line[..body_len]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

fn classify(line: &[u8]) -> LineFrame {
    let line = line.trim_ascii();
    if line.is_empty() {
        return LineFrame::Noise(NoiseKind::Empty);
    }
    if !looks_like_base64(line) {
        return LineFrame::Noise(NoiseKind::Alphabet);
    }
    let Ok(wire) = STANDARD.decode(line) else {
        return LineFrame::Noise(NoiseKind::Decode);
    };
    if wire.len() <= HEADER_LEN {
        return LineFrame::Noise(NoiseKind::Undersized);
    }
    match Fragment::from_wire(wire.into()) {
        Ok(fragment) => LineFrame::Fragment(fragment),
        Err(_) => LineFrame::Noise(NoiseKind::Malformed),
    }
}

impl Decoder for LineCodec {
    type Item = LineFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LINE_LENGTH {
                src.clear();
                self.discarding = true;
            }
            return Ok(None);
        };
        let line = src.split_to(newline + 1);
        if std::mem::take(&mut self.discarding) {
            return Ok(Some(LineFrame::Noise(NoiseKind::Overlong)));
        }
        Ok(Some(classify(&line[..newline])))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() && !self.discarding {
            return Ok(None);
        }
        src.advance(src.len());
        self.discarding = false;
        Ok(Some(LineFrame::Noise(NoiseKind::Truncated)))
    }
}

impl Encoder<Fragment> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Fragment, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = STANDARD.encode(item.to_wire());
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use rstest::rstest;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{LineCodec, LineFrame, MAX_LINE_LENGTH, NoiseKind, looks_like_base64};
    use crate::fragment::{SessionIndex, encode};

    fn decode_all(input: &[u8]) -> Vec<LineFrame> {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode_eof(&mut buf).expect("decode") {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn fragment_line_has_expected_text() {
        let fragment = encode(SessionIndex::new(0), b"hi!", 200)
            .expect("split")
            .remove(0);
        let mut dst = BytesMut::new();
        LineCodec::new().encode(fragment, &mut dst).expect("encode");
        // 0x00 0xff 'h' 'i' '!'
        assert_eq!(&dst[..], b"AP9oaSE=\n");
    }

    #[test]
    fn encoded_lines_decode_back_to_fragments() {
        let fragments = encode(SessionIndex::new(9), b"hello world", 4).expect("split");
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        for fragment in fragments.clone() {
            codec.encode(fragment, &mut buf).expect("encode");
        }
        let decoded = decode_all(&buf);
        let expected: Vec<LineFrame> = fragments.into_iter().map(LineFrame::Fragment).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn console_text_is_noise() {
        assert_eq!(
            decode_all(b"not-base64!!\n"),
            [LineFrame::Noise(NoiseKind::Alphabet)]
        );
    }

    #[rstest]
    #[case::blank(b"\n".as_slice(), NoiseKind::Empty)]
    #[case::bad_length(b"QUJD=\n".as_slice(), NoiseKind::Alphabet)]
    #[case::too_much_padding(b"Q===\n".as_slice(), NoiseKind::Alphabet)]
    #[case::non_canonical(b"QUJ=\n".as_slice(), NoiseKind::Decode)]
    #[case::two_bytes(b"AAE=\n".as_slice(), NoiseKind::Undersized)]
    #[case::zero_position(b"AQBh\n".as_slice(), NoiseKind::Malformed)]
    fn rejected_lines_are_classified(#[case] input: &[u8], #[case] kind: NoiseKind) {
        assert_eq!(decode_all(input), [LineFrame::Noise(kind)]);
    }

    #[test]
    fn crlf_terminated_lines_are_accepted() {
        let frames = decode_all(b"AP9oaSE=\r\n");
        let [LineFrame::Fragment(fragment)] = frames.as_slice() else {
            panic!("expected one fragment, got {frames:?}");
        };
        assert_eq!(fragment.payload(), b"hi!");
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"AP9o"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b"aSE=\n");
        assert!(matches!(
            codec.decode(&mut buf).expect("decode"),
            Some(LineFrame::Fragment(_))
        ));
    }

    #[test]
    fn unterminated_tail_at_eof_is_noise() {
        assert_eq!(
            decode_all(b"AP9oaSE="),
            [LineFrame::Noise(NoiseKind::Truncated)]
        );
    }

    #[test]
    fn overlong_line_is_discarded_up_to_its_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(vec![b'A'; MAX_LINE_LENGTH + 1].as_slice());
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"AAAA\nAP9oaSE=\n");
        assert_eq!(
            codec.decode(&mut buf).expect("decode"),
            Some(LineFrame::Noise(NoiseKind::Overlong))
        );
        let Some(LineFrame::Fragment(fragment)) = codec.decode(&mut buf).expect("decode") else {
            panic!("expected the following line to decode");
        };
        assert_eq!(fragment.into_payload(), Bytes::from_static(b"hi!"));
    }

    #[rstest]
    #[case(b"AP9oaSE=".as_slice(), true)]
    #[case(b"QUJD".as_slice(), true)]
    #[case(b"QQ==".as_slice(), true)]
    #[case(b"====".as_slice(), false)]
    #[case(b"QU-D".as_slice(), false)]
    #[case(b"QU=D".as_slice(), false)]
    #[case(b"".as_slice(), false)]
    fn base64_shape_check(#[case] line: &[u8], #[case] expected: bool) {
        assert_eq!(looks_like_base64(line), expected);
    }
}

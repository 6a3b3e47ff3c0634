//! Tests for header encoding, decoding, and position semantics.

use bytes::Bytes;
use rstest::rstest;

use crate::fragment::{
    Fragment,
    FragmentError,
    FragmentHeader,
    HEADER_LEN,
    Position,
    SessionIndex,
    decode_header,
};

#[rstest]
#[case::empty(&[])]
#[case::single_byte(&[7])]
fn decode_rejects_undersized_input(#[case] bytes: &[u8]) {
    assert_eq!(
        decode_header(bytes),
        Err(FragmentError::Malformed { len: bytes.len() })
    );
}

#[test]
fn decode_rejects_zero_position() {
    assert_eq!(decode_header(&[3, 0]), Err(FragmentError::ZeroPosition));
}

#[test]
fn decode_reads_index_and_signed_position() {
    let (index, position) = decode_header(&[200, 0xfd, 0xaa]).expect("valid header");
    assert_eq!(index, SessionIndex::new(200));
    assert_eq!(position.get(), -3);
    assert_eq!(position.ordinal(), 3);
    assert!(position.is_terminal());
}

#[test]
fn decode_accepts_most_negative_position() {
    let (_, position) = decode_header(&[0, 0x80]).expect("valid header");
    assert_eq!(position.ordinal(), 128);
    assert!(position.is_terminal());
}

#[test]
fn header_bytes_match_wire_layout() {
    let header = FragmentHeader::new(
        SessionIndex::new(9),
        Position::new(4, false).expect("valid ordinal"),
    );
    assert_eq!(header.to_bytes(), [9, 4]);
}

#[rstest]
#[case::zero(0, false)]
#[case::too_large(128, false)]
#[case::too_large_terminal(200, true)]
fn position_rejects_out_of_range_ordinals(#[case] ordinal: u8, #[case] terminal: bool) {
    assert!(Position::new(ordinal, terminal).is_none());
}

#[test]
fn session_index_wraps_after_255() {
    assert_eq!(SessionIndex::new(254).next(), SessionIndex::new(255));
    assert_eq!(SessionIndex::new(255).next(), SessionIndex::new(0));
}

#[test]
fn fragment_wire_form_is_header_then_payload() {
    let fragment = Fragment::new(
        FragmentHeader::new(SessionIndex::new(1), Position::new(1, true).expect("valid")),
        Bytes::from_static(b"abc"),
    );
    let wire = fragment.to_wire();
    assert_eq!(&wire[..], &[1, 0xff, b'a', b'b', b'c']);
    assert_eq!(fragment.wire_len(), HEADER_LEN + 3);

    let parsed = Fragment::from_wire(wire).expect("parse wire form");
    assert_eq!(parsed, fragment);
}

#[test]
fn fragment_from_wire_propagates_header_errors() {
    assert_eq!(
        Fragment::from_wire(Bytes::from_static(&[1])),
        Err(FragmentError::Malformed { len: 1 })
    );
}

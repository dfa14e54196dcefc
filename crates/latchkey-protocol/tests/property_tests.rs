//! Property-based tests for the sensor frame codec.
//!
//! These tests use proptest to generate random commands and payloads and
//! verify that framing invariants hold for every combination.

mod common;

use latchkey_core::Error;
use latchkey_protocol::{CommandCode, SliceReader, checksum, decode_response, encode_data, encode_simple};
use proptest::prelude::*;

/// Strategy for any command the sensor understands.
fn any_command() -> impl Strategy<Value = CommandCode> {
    prop::sample::select(common::ALL_COMMANDS.to_vec())
}

/// Strategy for payloads of realistic size, the empty payload included.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=2048)
}

proptest! {
    /// Property: the checksum byte cancels the XOR of the bytes it covers.
    #[test]
    fn prop_simple_frame_checksum_cancels(
        command in any_command(),
        p1 in any::<u8>(),
        p2 in any::<u8>(),
        p3 in any::<u8>(),
    ) {
        let frame = encode_simple(command, p1, p2, p3);
        prop_assert_eq!(frame.len(), 8);
        prop_assert_eq!(checksum(&frame[1..7]), 0);
        prop_assert_eq!(frame[0], 0xF5);
        prop_assert_eq!(frame[7], 0xF5);
    }

    /// Property: decoding an encoded simple command recovers the command and
    /// its three parameters, and consumes exactly the frame.
    #[test]
    fn prop_simple_frame_roundtrip(
        command in any_command(),
        p1 in any::<u8>(),
        p2 in any::<u8>(),
        p3 in any::<u8>(),
    ) {
        let frame = encode_simple(command, p1, p2, p3);
        let mut reader = SliceReader::new(&frame);
        let response = decode_response(&mut reader, false).unwrap();

        prop_assert_eq!(response.command, command.as_u8());
        prop_assert_eq!(response.params, [p1, p2, p3]);
        prop_assert_eq!(response.payload, None);
        prop_assert!(reader.remaining().is_empty());
    }

    /// Property: decoding an encoded data command recovers the exact payload.
    #[test]
    fn prop_data_frame_recovers_payload(command in any_command(), payload in payload()) {
        let frame = encode_data(command, &payload).unwrap();
        let mut reader = SliceReader::new(&frame);
        let response = decode_response(&mut reader, true).unwrap();

        prop_assert_eq!(response.command, command.as_u8());
        prop_assert_eq!(usize::from(response.high_word()), payload.len());
        prop_assert_eq!(response.payload, Some(payload));
        prop_assert!(reader.remaining().is_empty());
    }

    /// Property: flipping any single bit outside the sentinels is detected
    /// as a checksum mismatch.
    #[test]
    fn prop_single_bit_flip_is_detected(
        payload in prop::collection::vec(any::<u8>(), 1..=64),
        position_seed in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut frame = encode_data(CommandCode::DownloadEigenCompare, &payload)
            .unwrap()
            .to_vec();
        let positions = common::non_sentinel_positions(frame.len());
        let position = positions[position_seed.index(positions.len())];
        frame[position] ^= 1 << bit;

        let result = decode_response(&mut SliceReader::new(&frame), true);
        prop_assert!(
            matches!(result, Err(Error::ChecksumMismatch { .. })),
            "flip at {} bit {} gave {:?}", position, bit, result
        );
    }

    /// Property: a response cut short anywhere surfaces as a timeout.
    #[test]
    fn prop_truncated_response_times_out(payload in payload(), cut_seed in any::<prop::sample::Index>()) {
        let frame = encode_data(CommandCode::UploadEigenvalues, &payload).unwrap();
        let cut = cut_seed.index(frame.len());

        let result = decode_response(&mut SliceReader::new(&frame[..cut]), true);
        prop_assert!(matches!(result, Err(Error::Timeout { .. })), "cut at {} gave {:?}", cut, result);
    }

    /// Property: a corrupted sentinel is always a framing error.
    #[test]
    fn prop_corrupted_sentinel_is_framing_error(
        command in any_command(),
        sentinel_index in prop::sample::select(vec![0usize, 7]),
        replacement in any::<u8>().prop_filter("must differ from sentinel", |b| *b != 0xF5),
    ) {
        let mut frame = encode_simple(command, 0, 0, 0).to_vec();
        frame[sentinel_index] = replacement;

        let result = decode_response(&mut SliceReader::new(&frame), false);
        prop_assert!(matches!(result, Err(Error::Framing(_))));
    }
}

#[test]
fn test_max_payload_roundtrip() {
    let payload: Vec<u8> = (0..0xFFFF).map(|i| (i % 251) as u8).collect();
    let frame = encode_data(CommandCode::DownloadEigenCompare, &payload).unwrap();
    let response = decode_response(&mut SliceReader::new(&frame), true).unwrap();
    assert_eq!(response.payload.map(|p| p.len()), Some(0xFFFF));
}

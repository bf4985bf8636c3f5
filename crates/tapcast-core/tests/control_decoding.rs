//! Integration tests for the control-channel decoder.
//!
//! These tests drive [`ControlMessageReader`] through the public API the way
//! the connection does: bytes arrive in arbitrary chunks and messages are
//! drained whenever they are complete.

use tapcast_core::protocol::messages::{action, buttons};
use tapcast_core::{
    encode_control_message, ControlMessage, ControlMessageReader, InjectTouchMessage, Point,
    Position, Size,
};

fn touch(action: u8, pointer_id: u64, x: i32, y: i32, buttons: u32) -> ControlMessage {
    ControlMessage::InjectTouch(InjectTouchMessage {
        action,
        pointer_id,
        position: Position::new(Point::new(x, y), Size::new(720, 1280)),
        pressure: 1.0,
        buttons,
    })
}

/// Drains every complete message, skipping past unknown tag bytes.
fn drain(reader: &mut ControlMessageReader) -> Vec<ControlMessage> {
    let mut out = Vec::new();
    loop {
        let before = reader.buffered();
        match reader.next_message() {
            Some(msg) => out.push(msg),
            None if reader.buffered() < before => continue,
            None => return out,
        }
    }
}

fn sample_stream() -> (Vec<ControlMessage>, Vec<u8>) {
    let messages = vec![
        touch(action::DOWN, 0xFFFF_FFFF_FFFF_FFFE, 10, 20, buttons::PRIMARY),
        touch(action::MOVE, 0xFFFF_FFFF_FFFF_FFFE, 11, 21, buttons::PRIMARY),
        ControlMessage::StopStreaming,
        touch(action::UP, 0xFFFF_FFFF_FFFF_FFFE, 12, 22, 0),
    ];
    let bytes = messages.iter().flat_map(encode_control_message).collect();
    (messages, bytes)
}

#[test]
fn test_split_at_every_offset_yields_the_same_messages() {
    let (expected, bytes) = sample_stream();

    for split in 0..=bytes.len() {
        // Arrange
        let mut reader = ControlMessageReader::new();

        // Act
        reader.feed(&bytes[..split]).unwrap();
        let mut decoded = drain(&mut reader);
        reader.feed(&bytes[split..]).unwrap();
        decoded.extend(drain(&mut reader));

        // Assert
        assert_eq!(decoded, expected, "split at offset {split}");
        assert_eq!(reader.buffered(), 0);
    }
}

#[test]
fn test_byte_at_a_time_delivery() {
    let (expected, bytes) = sample_stream();
    let mut reader = ControlMessageReader::new();
    let mut decoded = Vec::new();

    for b in &bytes {
        reader.feed(std::slice::from_ref(b)).unwrap();
        decoded.extend(drain(&mut reader));
    }

    assert_eq!(decoded, expected);
}

#[test]
fn test_unknown_tag_followed_by_valid_message() {
    let valid = touch(action::DOWN, 3, 100, 200, 0);
    let mut bytes = vec![0x00, 0x7F];
    bytes.extend(encode_control_message(&valid));
    let mut reader = ControlMessageReader::new();

    reader.feed(&bytes).unwrap();

    assert_eq!(drain(&mut reader), vec![valid]);
}

#[test]
fn test_spare_capacity_and_commit_behave_like_feed() {
    let (expected, bytes) = sample_stream();
    let mut reader = ControlMessageReader::with_capacity(64);
    let mut decoded = Vec::new();
    let mut rest = &bytes[..];

    while !rest.is_empty() {
        let spare = reader.spare_capacity().unwrap();
        let n = spare.len().min(rest.len()).min(13);
        spare[..n].copy_from_slice(&rest[..n]);
        reader.commit(n);
        rest = &rest[n..];
        decoded.extend(drain(&mut reader));
    }

    assert_eq!(decoded, expected);
}

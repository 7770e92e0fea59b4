// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn payload_round_trips_through_json() {
    let payload = SubjobPayload::new(SubjobId::new(3), vec![0x1f, 0x8b, 0x00, 0xff]);
    let json = serde_json::to_string(&payload).unwrap();
    let back: SubjobPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn tarball_is_hex_encoded_on_the_wire() {
    let payload = SubjobPayload::new(SubjobId::new(0), vec![0xde, 0xad]);
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["tarball"], "dead");
}

#[test]
fn odd_length_hex_is_rejected() {
    let err = serde_json::from_str::<SubjobPayload>(r#"{"subjob_id":0,"tarball":"abc"}"#);
    assert!(err.is_err());
}

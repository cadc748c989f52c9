//! Integration tests for emonlink-common.

use emonlink_common::{
    Format, KeyExprBuilder, Payload, all_payloads_wildcard, decode, decode_auto, encode,
    parse_key_expr, validate_chunk,
};

#[test]
fn test_payload_envelope_workflow() {
    let payload = Payload::new("gateway", "12", vec![1, 0, 2, 0, 3, 0, 4, 0]);

    let json_bytes = encode(&payload, Format::Json).expect("JSON encode failed");
    let decoded: Payload = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.node_id, "12");
    assert_eq!(decoded.interfacer, "gateway");
    assert_eq!(decoded.data, vec![1, 0, 2, 0, 3, 0, 4, 0]);

    let cbor_bytes = encode(&payload, Format::Cbor).expect("CBOR encode failed");
    assert!(cbor_bytes.len() < json_bytes.len());

    let auto_decoded: Payload = decode_auto(&cbor_bytes).expect("Auto decode failed");
    assert_eq!(auto_decoded, decoded);
}

#[test]
fn test_channel_keys_round_trip() {
    let builder = KeyExprBuilder::new();

    for (channel, node) in [("ToEmonCMS", "10"), ("ToRFM12", "5"), ("archive", "hioki")] {
        validate_chunk(channel).expect("channel should be a valid chunk");
        validate_chunk(node).expect("node id should be a valid chunk");

        let key = builder.build(channel, node);
        let parsed = parse_key_expr(&key).expect("Parse failed");
        assert_eq!(parsed.channel, channel);
        assert_eq!(parsed.node_id, node);
    }

    assert_eq!(all_payloads_wildcard(), "emonlink/**");
}

#[test]
fn test_empty_payload_serializes() {
    let payload = Payload::new("meter", "1", Vec::new());
    assert!(payload.is_empty());

    let bytes = encode(&payload, Format::Json).unwrap();
    let decoded: Payload = decode_auto(&bytes).unwrap();
    assert!(decoded.is_empty());
}

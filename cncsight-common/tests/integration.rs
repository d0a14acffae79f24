//! Integration tests for cncsight-common library.

use cncsight_common::{
    Adapter, ConditionLevel, Format, KeyExprBuilder, Observation, ObservationRecord,
    ObservationValue, SampleValue, decode, encode,
};

fn record(observation: Observation) -> ObservationRecord {
    ObservationRecord::new(1_700_000_000_123, "vf2", Adapter::Haas, observation)
}

#[test]
fn test_full_observation_workflow() {
    let fault = record(Observation::fault("system", "Alarm on indicator"));

    let json_bytes = encode(&fault, Format::Json).expect("JSON encode failed");
    let decoded: ObservationRecord = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.device, "vf2");
    assert_eq!(decoded.adapter, Adapter::Haas);
    assert_eq!(decoded.timestamp, 1_700_000_000_123);
    match decoded.observation.value {
        ObservationValue::Condition(state) => {
            assert_eq!(state.level, ConditionLevel::Fault);
            assert_eq!(state.message.as_deref(), Some("Alarm on indicator"));
        }
        other => panic!("expected condition, got {:?}", other),
    }

    let cbor_bytes = encode(&fault, Format::Cbor).expect("CBOR encode failed");
    assert!(
        cbor_bytes.len() < json_bytes.len(),
        "CBOR should be smaller than JSON"
    );

    let cbor_decoded: ObservationRecord = decode(&cbor_bytes, Format::Cbor).expect("CBOR decode failed");
    assert_eq!(cbor_decoded.observation, fault.observation);
}

#[test]
fn test_sample_precision_survives_both_formats() {
    for text in ["12.345", "-0.0001", "1000", "3.14159265358979323846"] {
        let sample = record(Observation::sample(
            "x_act",
            SampleValue::parse(text).expect("numeric"),
        ));

        for format in [Format::Json, Format::Cbor] {
            let bytes = encode(&sample, format).unwrap();
            let decoded: ObservationRecord = decode(&bytes, format).unwrap();
            match decoded.observation.value {
                ObservationValue::Sample(v) => assert_eq!(v.as_str(), text),
                other => panic!("expected sample, got {:?}", other),
            }
        }
    }
}

#[test]
fn test_event_with_empty_value() {
    let program = record(Observation::event("program", ""));
    let bytes = encode(&program, Format::Json).unwrap();
    let decoded: ObservationRecord = decode(&bytes, Format::Json).unwrap();
    assert_eq!(decoded.observation.value, ObservationValue::Event(String::new()));
}

#[test]
fn test_key_expression_building() {
    let builder = KeyExprBuilder::new(Adapter::Haas);
    let key = builder.build("vf2", "execution");
    assert_eq!(key, "cncsight/haas/vf2/execution");
    assert_eq!(builder.status_key(), "cncsight/haas/@/status");
}

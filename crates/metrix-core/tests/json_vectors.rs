//! Structured (JSON) wire form vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use metrix_core::protocol::json::UpdateBody;
use metrix_core::MetricStore;

use vector_loader::load;

#[test]
fn json_vectors() {
    let files = [
        "gauge_ok.json",
        "counter_ok.json",
        "gauge_integer_value.json",
        "counter_missing_delta.json",
        "counter_negative_delta.json",
        "gauge_missing_value.json",
        "unknown_type.json",
        "empty_id.json",
        "batch_ok.json",
        "batch_empty.json",
    ];

    for f in files {
        let v = load(f);
        let res = serde_json::from_value::<UpdateBody>(v.body.clone())
            .map_err(|e| metrix_core::MetrixError::BadRequest(e.to_string()))
            .and_then(UpdateBody::into_updates);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let updates = res.expect("expected ok updates");
        let store = MetricStore::new();
        let values = store.apply_batch(&updates).expect("apply");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(values.len(), ex.len(), "vector={}", v.description);
        for (got, want) in values.iter().zip(ex.iter()) {
            assert_eq!(got.kind().as_str(), want.kind, "vector={}", v.description);
            assert_eq!(got.name(), want.name, "vector={}", v.description);
            assert_eq!(got.value_text(), want.text, "vector={}", v.description);
        }
    }
}

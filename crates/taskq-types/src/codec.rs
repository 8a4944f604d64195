// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::task::{Kwargs, TaskRecord};
use serde::{Deserialize, Serialize};

/// Current wire schema version. Bump whenever a field is added or a default
/// changes; the decoder rejects anything it doesn't recognize rather than
/// guessing.
const SCHEMA_VERSION: u32 = 1;

/// On-wire envelope around a `TaskRecord`. Kept as a distinct type from
/// `TaskRecord` so the schema version travels with the bytes without leaking
/// into the in-memory representation the executor works with.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    version: u32,
    name: String,
    kwargs: Kwargs,
    run_count: u32,
    date: i64,
}

/// Encodes a task record to its wire bytes. Deterministic for a given input:
/// the same record always produces the same bytes, because `Kwargs` is a
/// `BTreeMap` and `serde_json` serializes object keys in iteration order.
pub fn encode(task: &TaskRecord) -> Result<Vec<u8>> {
    let envelope = Envelope {
        version: SCHEMA_VERSION,
        name: task.name.clone(),
        kwargs: task.kwargs.clone(),
        run_count: task.run_count,
        date: task.date,
    };
    serde_json::to_vec(&envelope).map_err(|e| Error::CodecError(e.to_string()))
}

/// Decodes wire bytes back into a task record. Unknown top-level fields or a
/// schema version this build doesn't understand are rejected rather than
/// silently dropped, per the forward-compatibility contract: new fields must
/// be additive and optional, never silently ignored.
pub fn decode(bytes: &[u8]) -> Result<TaskRecord> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| Error::CodecError(e.to_string()))?;
    if envelope.version != SCHEMA_VERSION {
        return Err(Error::CodecError(format!(
            "unsupported task schema version {}, expected {}",
            envelope.version, SCHEMA_VERSION
        )));
    }
    Ok(TaskRecord {
        name: envelope.name,
        kwargs: envelope.kwargs,
        run_count: envelope.run_count,
        date: envelope.date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_task() -> impl Strategy<Value = TaskRecord> {
        (
            "[a-z_]{1,16}",
            proptest::collection::btree_map("[a-z]{1,8}", any::<i64>().prop_map(|n| serde_json::json!(n)), 0..4),
            0u32..50,
            any::<i64>(),
        )
            .prop_map(|(name, kwargs, run_count, date)| TaskRecord {
                name,
                kwargs,
                run_count,
                date,
            })
    }

    proptest! {
        #[test]
        fn round_trips_byte_exactly(task in arb_task()) {
            let encoded = encode(&task).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, task.clone());
            // Determinism: encoding twice yields identical bytes.
            prop_assert_eq!(encode(&task).unwrap(), encoded);
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let bytes = br#"{"version":1,"name":"x","kwargs":{},"run_count":0,"date":0,"extra":true}"#;
        assert!(matches!(decode(bytes), Err(Error::CodecError(_))));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let bytes = br#"{"version":99,"name":"x","kwargs":{},"run_count":0,"date":0}"#;
        assert!(matches!(decode(bytes), Err(Error::CodecError(_))));
    }

    #[test]
    fn rejects_corrupt_bytes() {
        assert!(matches!(decode(b"not json"), Err(Error::CodecError(_))));
    }
}

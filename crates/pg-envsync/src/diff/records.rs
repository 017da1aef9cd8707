//! Record differ: computes the minimal insert/update set between two keyed
//! record sets.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::record::{Record, RecordSet, ReconciliationPlan, Value};

/// Hashable form of an identity value, for building the target index.
///
/// Floats are keyed by bit pattern; a NULL identity is a legal (if odd) key
/// and matches only another NULL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Null,
    Bool(bool),
    Int(i64),
    FloatBits(u64),
    Text(String),
}

impl IdentityKey {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => IdentityKey::Null,
            Value::Bool(v) => IdentityKey::Bool(*v),
            Value::Int(v) => IdentityKey::Int(*v),
            Value::Float(v) => IdentityKey::FloatBits(v.to_bits()),
            Value::Text(v) => IdentityKey::Text(v.clone()),
        }
    }
}

/// Compare source and target record sets for the same table and compute the
/// reconciliation plan that converges the target toward the source.
///
/// Matching is by the single identity field. Records lacking the identity
/// field are excluded on both sides (logged, never erred): an identity-less
/// target record can never be matched, an identity-less source record is
/// neither inserted nor updated.
///
/// A source record whose identity exists on the target enters the update-set
/// as soon as one field present in BOTH records differs by strict inequality;
/// the whole source record is carried, not just the differing fields. Fields
/// present only in the source do not by themselves trigger an update, and
/// fields present only in the target are never inspected.
pub fn diff_records(
    source: &RecordSet,
    target: &RecordSet,
    identity_field: &str,
) -> ReconciliationPlan {
    let mut target_index: HashMap<IdentityKey, &Record> = HashMap::with_capacity(target.len());
    for record in target {
        match record.identity(identity_field) {
            Some(id) => {
                target_index.insert(IdentityKey::of(id), record);
            }
            None => {
                warn!(
                    identity_field,
                    "target record lacks identity field, excluded from matching"
                );
            }
        }
    }

    let mut plan = ReconciliationPlan::default();

    for record in source {
        let Some(id) = record.identity(identity_field) else {
            warn!(
                identity_field,
                "source record lacks identity field, excluded from reconciliation"
            );
            continue;
        };

        match target_index.get(&IdentityKey::of(id)) {
            None => plan.inserts.push(record.clone()),
            Some(matched) => {
                if differs(record, matched, identity_field) {
                    debug!(identity = %id, "record differs, scheduling full-record update");
                    plan.updates.push(record.clone());
                }
            }
        }
    }

    plan
}

/// Check whether any field present in both records differs, excluding the
/// identity field. Strict inequality, no type coercion.
fn differs(source: &Record, target: &Record, identity_field: &str) -> bool {
    source.iter().any(|(name, value)| {
        name != identity_field
            && target
                .get(name)
                .is_some_and(|target_value| target_value != value)
    })
}

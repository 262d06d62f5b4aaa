//! Choosing survivors among records that share a composite key.

use qrda_core::FactRecord;

/// Keep the last candidate, then every earlier candidate whose key was not
/// already kept.
///
/// Output order is the last candidate first, then the kept earlier
/// candidates in their original order.
pub fn retain_distinct<T, K, F>(mut candidates: Vec<T>, key_fn: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let Some(primary) = candidates.pop() else {
        return Vec::new();
    };

    let mut kept_keys = vec![key_fn(&primary)];
    let mut kept = vec![primary];
    for candidate in candidates {
        let key = key_fn(&candidate);
        if kept_keys.contains(&key) {
            continue;
        }
        kept_keys.push(key);
        kept.push(candidate);
    }
    kept
}

/// Sorted `code_system` pairs followed by admission and discharge times.
pub fn encounter_uniqueness_key(encounter: &FactRecord) -> String {
    let mut codes: Vec<String> = encounter
        .codes
        .iter()
        .map(|code| format!("{}_{}", code.code, code.system))
        .collect();
    codes.sort();

    let period = encounter.relevant_period.as_ref();
    let admission = period
        .and_then(|p| p.low)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    let discharge = period
        .and_then(|p| p.high)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    format!("[{}]{admission}{discharge}", codes.join(", "))
}

//! Desired-vs-live comparison for the apply primitive
//!
//! A live object "matches" a desired manifest when every field the manifest sets
//! is present in the live object with the same value. Fields the API server owns
//! (status, resource versions, managed fields, ...) are dropped from the desired
//! side before comparing, so server defaulting never triggers a patch.
//!
//! Two server rewrites are tolerated: empty values the API server omits
//! (`value: ""`, `[]`, `{}`), and resource quantities it canonicalizes (`0.5`
//! becomes `500m`, `1024Mi` becomes `1Gi`) under `limits` and `requests`.

use serde_json::Value;

/// Metadata fields written by the API server
const SERVER_MANAGED_METADATA: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "selfLink",
];

/// Returns true when `live` does not yet contain everything `desired` declares
pub fn needs_update(desired: &Value, live: &Value) -> bool {
    let desired = strip_server_fields(desired.clone());
    !is_subset(&desired, live)
}

/// Removes status and server-managed metadata from a manifest
pub fn strip_server_fields(mut manifest: Value) -> Value {
    if let Some(obj) = manifest.as_object_mut() {
        obj.remove("status");
        if let Some(meta) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in SERVER_MANAGED_METADATA {
                meta.remove(*field);
            }
        }
        if let Some(templates) = obj
            .get_mut("spec")
            .and_then(|spec| spec.get_mut("volumeClaimTemplates"))
            .and_then(Value::as_array_mut)
        {
            for template in templates {
                if let Some(t) = template.as_object_mut() {
                    t.remove("apiVersion");
                    t.remove("kind");
                    t.remove("status");
                    t.remove("metadata");
                }
            }
        }
    }
    manifest
}

/// Recursive containment check
///
/// Objects: every desired key must exist in live with a contained value, unless
/// the desired value is empty. Arrays: same length, element-wise containment.
/// `null` matches anything.
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    contains(desired, live, false)
}

fn contains(desired: &Value, live: &Value, quantities: bool) -> bool {
    match (desired, live) {
        (Value::Null, _) => true,
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(key, value)| {
            let quantities = quantities || key == "limits" || key == "requests";
            have.get(key).map_or_else(
                || is_empty(value),
                |live_value| contains(value, live_value, quantities),
            )
        }),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len()
                && want.iter().zip(have).all(|(w, h)| contains(w, h, quantities))
        }
        (Value::String(want), Value::String(have)) if quantities && want != have => {
            match (parse_quantity(want), parse_quantity(have)) {
                (Some(w), Some(h)) => (w - h).abs() <= f64::EPSILON * w.abs().max(h.abs()),
                _ => false,
            }
        }
        (want, have) => want == have,
    }
}

// Values the API server drops when serializing with omitempty
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

const QUANTITY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Numeric value of a Kubernetes quantity such as `500m`, `1Gi` or `1e3`
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    for (suffix, factor) in QUANTITY_SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * factor);
        }
    }
    quantity.parse::<f64>().ok()
}

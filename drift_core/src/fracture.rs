//! The "FRACTURE" Engine - structural redaction of records.
//!
//! Fracturing walks the top-level fields of a JSON record and, with a fixed
//! probability per field, swaps the value for a redacted stand-in. The
//! engine knows nothing about record kinds; it only looks at value shapes.

use rand::Rng;
use serde_json::{Map, Value};

/// Glyph used to black out text.
pub const BLOCK_GLYPH: char = '█';

/// Replacement for numeric (and boolean) values.
pub const NUMERIC_PLACEHOLDER: &str = "###";

/// Replacement for values with no partial form (null, nested objects).
pub const OPAQUE_PLACEHOLDER: &str = "█████";

/// Strings at or below this length are blacked out entirely.
const SHORT_STRING_CHARS: usize = 3;

/// Returns a fractured copy of `record`.
///
/// Objects are fractured field by field. Any other value is treated as a
/// single field. `probability` is clamped to [0, 1].
pub fn fracture<R: Rng + ?Sized>(record: &Value, probability: f64, rng: &mut R) -> Value {
    let p = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };

    match record {
        Value::Object(fields) => {
            let fractured: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.clone(), maybe_corrupt(value, p, rng)))
                .collect();
            Value::Object(fractured)
        }
        other => maybe_corrupt(other, p, rng),
    }
}

fn maybe_corrupt<R: Rng + ?Sized>(value: &Value, p: f64, rng: &mut R) -> Value {
    if rng.gen_bool(p) {
        corrupt_value(value)
    } else {
        value.clone()
    }
}

/// Deterministic redaction of one value.
pub fn corrupt_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(corrupt_text(text)),
        Value::Number(_) | Value::Bool(_) => Value::String(NUMERIC_PLACEHOLDER.to_string()),
        Value::Array(items) => {
            let keep = items.len() / 2;
            let mut out: Vec<Value> = items[..keep].to_vec();
            out.extend(
                std::iter::repeat(Value::String(BLOCK_GLYPH.to_string())).take(items.len() - keep),
            );
            Value::Array(out)
        }
        Value::Null | Value::Object(_) => Value::String(OPAQUE_PLACEHOLDER.to_string()),
    }
}

/// Keeps the first half of the characters and blacks out the rest.
fn corrupt_text(text: &str) -> String {
    let chars = text.chars().count();
    if chars <= SHORT_STRING_CHARS {
        return std::iter::repeat(BLOCK_GLYPH).take(chars).collect();
    }

    let keep = chars / 2;
    text.chars()
        .take(keep)
        .chain(std::iter::repeat(BLOCK_GLYPH).take(chars - keep))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "node_id": "Xi-Void-404-1234",
            "sigil": "▲",
            "entropy_release": 0.052,
            "fragments_released": 2,
            "glyph_state": ["▲", "⊗", "≈", "∇"],
            "sentient": true,
            "parent": null,
            "potential": { "pattern_strength": 0.5 },
        })
    }

    #[test]
    fn test_probability_zero_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let record = sample_record();
        assert_eq!(fracture(&record, 0.0, &mut rng), record);
    }

    #[test]
    fn test_probability_one_corrupts_every_field() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let fractured = fracture(&sample_record(), 1.0, &mut rng);

        assert_eq!(fractured["node_id"], json!("Xi-Void-████████"));
        assert_eq!(fractured["sigil"], json!("█"));
        assert_eq!(fractured["entropy_release"], json!("###"));
        assert_eq!(fractured["fragments_released"], json!("###"));
        assert_eq!(fractured["glyph_state"], json!(["▲", "⊗", "█", "█"]));
        assert_eq!(fractured["sentient"], json!("###"));
        assert_eq!(fractured["parent"], json!("█████"));
        assert_eq!(fractured["potential"], json!("█████"));
    }

    #[test]
    fn test_odd_lengths_preserve_size() {
        assert_eq!(corrupt_text("abcde"), "ab███");
        assert_eq!(corrupt_value(&json!([1, 2, 3])), json!([1, "█", "█"]));
        assert_eq!(corrupt_text(""), "");
    }

    #[test]
    fn test_fields_untouched_or_corrupted() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let record = sample_record();
        let fractured = fracture(&record, 0.3, &mut rng);

        let obj = fractured.as_object().unwrap();
        assert_eq!(obj.len(), record.as_object().unwrap().len());
        for (key, value) in obj {
            let original = &record[key];
            assert!(value == original || *value == corrupt_value(original));
        }
    }

    #[test]
    fn test_refracture_never_reveals() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let record = sample_record();
        let once = fracture(&record, 1.0, &mut rng);

        for _ in 0..50 {
            let again = fracture(&once, 0.5, &mut rng);
            for (key, value) in again.as_object().unwrap() {
                // Redacted fields stay redacted: never the original value
                if once[key] != record[key] {
                    assert_ne!(*value, record[key]);
                }
            }
        }
    }

    #[test]
    fn test_non_object_treated_as_single_field() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(fracture(&json!("chronicle"), 1.0, &mut rng), json!("chro█████"));
        assert_eq!(fracture(&json!(42), 0.0, &mut rng), json!(42));
    }
}

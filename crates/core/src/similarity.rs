use serde_json::Value;

/// Cosine similarity clamped into [0, 1]. Defined as 0 when the vectors
/// disagree on dimension or either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (left, right) in a.iter().zip(b.iter()) {
        dot += f64::from(*left) * f64::from(*right);
        norm_a += f64::from(*left) * f64::from(*left);
        norm_b += f64::from(*right) * f64::from(*right);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Decodes a stored embedding. Stores hand back either a numeric JSON array
/// or the same array serialized into a string; anything else is treated as a
/// malformed row and skipped by the caller.
pub fn decode_embedding(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_f64().map(|n| n as f32))
            .collect(),
        Value::String(text) => serde_json::from_str::<Vec<f32>>(text).ok(),
        _ => None,
    }
}

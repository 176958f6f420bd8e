//! Request fingerprinting.

use relay_core::Request;
use serde_json::{Map, Value, json};
use sha2::{Digest as _, Sha256};

/// Derives the cache key for a request.
///
/// The request is normalized into a canonical JSON document (object keys
/// sorted at every depth, unset optional fields encoded as `null`) and
/// hashed with SHA-256. Requests that differ only in metadata insertion
/// order therefore share a key.
pub fn fingerprint(request: &Request) -> String {
    let metadata: Map<String, Value> = request
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), canonicalize(value)))
        .collect();

    let document = json!({
        "prompt": request.prompt,
        "systemPrompt": request.system_prompt,
        "maxTokens": request.max_tokens,
        "temperature": request.temperature.map(f64::from),
        "metadata": canonicalize(&Value::Object(metadata)),
    });

    let digest = Sha256::digest(document.to_string().as_bytes());
    hex::encode(digest)
}

/// Rebuilds a JSON value with object keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|key| (key.clone(), canonicalize(&object[key])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

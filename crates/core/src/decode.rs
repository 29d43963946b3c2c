//! Decoding of embedded YAML payloads (ConfigMap `data["crd"]`).

use serde_json::Value as Json;

use crate::Resource;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("configmap {0} is missing the `crd` field in its data")]
    MissingPayload(String),
    #[error("payload too large (>{limit} bytes)")]
    TooLarge { limit: usize },
    #[error("payload too complex (>{limit} nodes)")]
    TooComplex { limit: usize },
    #[error("parsing payload YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("converting payload to JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a mapping")]
    NotAnObject,
    #[error("payload missing {0}")]
    MissingField(&'static str),
}

fn max_yaml_bytes() -> usize {
    std::env::var("LOSTROMOS_MAX_YAML_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000_000) // 1 MiB default
}

fn max_yaml_nodes() -> usize {
    std::env::var("LOSTROMOS_MAX_YAML_NODES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(100_000)
}

fn json_node_budget_exceeded(v: &Json, max: usize) -> bool {
    // Bail out as soon as the running count reaches max
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur >= max { return; }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for vv in map.values() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr.iter() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max);
    count >= max
}

/// Parse a YAML document into a [`Resource`]. The document must be a mapping
/// carrying `apiVersion` and `kind`; identity fields are left to the caller.
pub fn decode_resource(yaml: &str) -> Result<Resource, DecodeError> {
    decode_with_limits(yaml, max_yaml_bytes(), max_yaml_nodes())
}

fn decode_with_limits(yaml: &str, max_bytes: usize, max_nodes: usize) -> Result<Resource, DecodeError> {
    if yaml.len() > max_bytes {
        return Err(DecodeError::TooLarge { limit: max_bytes });
    }
    let val: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let json = serde_json::to_value(val)?;
    if json_node_budget_exceeded(&json, max_nodes) {
        return Err(DecodeError::TooComplex { limit: max_nodes });
    }
    if !json.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    if json.get("apiVersion").and_then(|v| v.as_str()).is_none() {
        return Err(DecodeError::MissingField("apiVersion"));
    }
    if json.get("kind").and_then(|v| v.as_str()).is_none() {
        return Err(DecodeError::MissingField("kind"));
    }
    Resource::from_value(json)
}

//! Untyped formatter-config documents

use serde_json::{Map, Value};

/// Option name to arbitrary value, passed through to the engine unvalidated.
pub type ConfigDocument = Map<String, Value>;

/// Key the engine reads to learn which file it is formatting.
pub const FILEPATH_KEY: &str = "filepath";

/// Decode config bytes, trying YAML first (a superset of JSON) and TOML second.
///
/// On failure the YAML error is returned since JSON and YAML configs are
/// far more common than TOML ones.
pub fn decode_document(bytes: &[u8]) -> Result<ConfigDocument, String> {
    let yaml_err = match serde_yaml::from_slice::<ConfigDocument>(bytes) {
        Ok(doc) => return Ok(doc),
        Err(e) => e,
    };

    if let Ok(doc) = std::str::from_utf8(bytes)
        .map_err(|e| e.to_string())
        .and_then(|s| toml::from_str::<ConfigDocument>(s).map_err(|e| e.to_string()))
    {
        return Ok(doc);
    }

    Err(yaml_err.to_string())
}

/// Overlay `top` onto `base`, key by key.
pub fn overlay(base: &mut ConfigDocument, top: &ConfigDocument) {
    for (key, value) in top {
        base.insert(key.clone(), value.clone());
    }
}

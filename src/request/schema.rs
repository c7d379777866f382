use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

/// Compile the bundled map schema
///
/// Environment maps must be flat JSON objects whose values are all expression strings.
pub fn load_map_schema() -> JSONSchema {
    /// included map schema
    static MAP_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/map.json"));
    let schema: Value = serde_json::from_str(MAP_SCHEMA).expect("Valid bundled JSON");
    JSONSchema::compile(&schema).expect("Valid bundled schema")
}

/// Validate an untyped map document, collecting every violation
pub fn validate_map(compiled_schema: &JSONSchema, json: &Value) -> Result<(), Vec<String>> {
    info!("Validating environment map against JSON schema");
    match compiled_schema.validate(json) {
        Ok(_) => Ok(()),
        Err(errors) => {
            let reasons: Vec<String> = errors
                .map(|err| format!("{} (at '{}')", err, err.instance_path))
                .collect();
            warn!("Environment map fails validation: {}", reasons.join("; "));
            Err(reasons)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_string_map_is_valid() {
        let schema = load_map_schema();
        let map = json!({"walltime": "-W $walltime", "drona_warning": ""});
        assert!(validate_map(&schema, &map).is_ok());
    }

    #[test]
    fn non_string_values_are_reported() {
        let schema = load_map_schema();
        let map = json!({"cores": 4, "nested": {"a": "b"}});
        let reasons = validate_map(&schema, &map).unwrap_err();
        assert!(!reasons.is_empty());
    }

    #[test]
    fn map_must_be_an_object() {
        let schema = load_map_schema();
        assert!(validate_map(&schema, &json!(["-n $cores"])).is_err());
    }
}

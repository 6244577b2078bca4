//! Response Schema Contract
//!
//! Builds the structural schema sent with every request (the service is
//! instructed to emit strictly schema-conformant JSON) and validates parsed
//! payloads against it before they are returned to the caller.

use serde_json::Value;

/// A structural schema: the service-side contract plus the required-field
/// list used for local validation of what comes back.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    root: Value,
}

impl SchemaDescriptor {
    /// Schema for the organism analysis payload: five required top-level
    /// fields, with the classification ranks individually optional inside a
    /// required container.
    pub fn analysis() -> Self {
        let root = serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "scientificName": {"type": "STRING"},
                "commonName": {"type": "STRING"},
                "summary": {"type": "STRING"},
                "classification": {
                    "type": "OBJECT",
                    "properties": {
                        "order": {"type": "STRING"},
                        "family": {"type": "STRING"},
                        "class": {"type": "STRING"},
                    },
                },
                "ecologicalRole": {"type": "STRING"},
            },
            "required": [
                "scientificName",
                "commonName",
                "summary",
                "classification",
                "ecologicalRole",
            ],
        });
        Self { root }
    }

    /// The schema document embedded into the request's generation config.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Names of the required top-level fields.
    pub fn required_fields(&self) -> Vec<&str> {
        self.root["required"]
            .as_array()
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Structurally validate a parsed payload: every required field must be
    /// present, non-null, and of the declared type. Returns the list of
    /// violated field names on failure.
    pub fn validate(&self, payload: &Value) -> Result<(), Vec<String>> {
        let mut missing = Vec::new();

        if !payload.is_object() {
            return Err(vec!["<root>".to_string()]);
        }

        for name in self.required_fields() {
            let declared = &self.root["properties"][name]["type"];
            let field = &payload[name];
            let ok = match declared.as_str() {
                Some("STRING") => field.is_string(),
                Some("OBJECT") => field.is_object(),
                _ => !field.is_null(),
            };
            if !ok {
                missing.push(name.to_string());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

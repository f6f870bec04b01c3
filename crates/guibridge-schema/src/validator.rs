use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Violations reported per rejected payload.
const MAX_VIOLATIONS: usize = 4;

pub(crate) fn check_payload(verb: &str, payload: &Value, validator: &Validator) -> Result<()> {
    let violations: Vec<String> = validator
        .iter_errors(payload)
        .take(MAX_VIOLATIONS)
        .map(|err| err.to_string())
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Rejected {
            verb: verb.to_string(),
            violations,
        })
    }
}

use std::collections::HashMap;
use std::fs::{DirEntry, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::check_payload;

const SCHEMA_SUFFIX: &str = ".schema.json";
const MAX_VERB_LEN: usize = 64;

/// Subschema-bearing keywords whose values are maps of schemas.
const MAP_KEYWORDS: [&str; 5] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Subschema-bearing keywords whose values are a schema or a list of schemas.
const NESTED_KEYWORDS: [&str; 15] = [
    "propertyNames",
    "additionalProperties",
    "unevaluatedProperties",
    "items",
    "contains",
    "additionalItems",
    "unevaluatedItems",
    "not",
    "if",
    "then",
    "else",
    "prefixItems",
    "allOf",
    "anyOf",
    "oneOf",
];

/// Compiled payload schemas keyed by command verb.
pub struct VerbSchemaRegistry {
    validators: HashMap<String, Validator>,
    config: RegistryConfig,
}

impl VerbSchemaRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Compile `schema_json` and use it for `verb`, replacing any earlier one.
    pub fn register(&mut self, verb: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(verb, &schema)
    }

    pub fn register_value(&mut self, verb: &str, schema: &Value) -> Result<()> {
        let closed;
        let schema = if self.config.strict {
            let mut copy = schema.clone();
            close_object_schemas(&mut copy);
            closed = copy;
            &closed
        } else {
            schema
        };
        let compiled = jsonschema::validator_for(schema).map_err(|err| SchemaError::Compile {
            verb: verb.to_string(),
            reason: err.to_string(),
        })?;

        self.validators.insert(verb.to_string(), compiled);
        Ok(())
    }

    /// Load every `<verb>.schema.json` in `dir`.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        Self::from_directory_with_config(dir, RegistryConfig::default())
    }

    /// Symlinked schema files and files whose stem is not a plausible verb
    /// are refused. Anything without the schema suffix is ignored.
    pub fn from_directory_with_config(dir: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let entries = std::fs::read_dir(dir).map_err(|err| SchemaError::load(dir, err))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::load(dir, err))?;
            let Some((verb, path)) = schema_file(&entry)? else {
                continue;
            };
            if registry.validators.len() >= config.max_files {
                return Err(SchemaError::load(
                    dir,
                    format!("more than {} schema files", config.max_files),
                ));
            }

            let source = read_bounded(&path, config.max_file_bytes)?;
            registry.register(&verb, &source)?;
            tracing::debug!(verb = %verb, path = %path.display(), "loaded payload schema");
        }

        Ok(registry)
    }

    /// Build from schema sources compiled into the binary.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (verb, source) in schemas {
            registry.register(verb, source)?;
        }
        Ok(registry)
    }

    /// Check a Command payload against the schema for its verb.
    pub fn validate(&self, verb: &str, payload: &Value) -> Result<()> {
        match self.validators.get(verb) {
            Some(validator) => check_payload(verb, payload, validator),
            None if self.config.require_schema => Err(SchemaError::NoSchema(verb.to_string())),
            None => Ok(()),
        }
    }

    pub fn has_schema(&self, verb: &str) -> bool {
        self.validators.contains_key(verb)
    }

    /// Verbs with a registered schema, sorted.
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for VerbSchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VerbSchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbSchemaRegistry")
            .field("verbs", &self.verbs())
            .field("config", &self.config)
            .finish()
    }
}

/// `Some((verb, path))` for a regular `<verb>.schema.json` entry.
fn schema_file(entry: &DirEntry) -> Result<Option<(String, PathBuf)>> {
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().into_owned();
    let Some(verb) = name.strip_suffix(SCHEMA_SUFFIX) else {
        return Ok(None);
    };

    let file_type = std::fs::symlink_metadata(&path)
        .map_err(|err| SchemaError::load(&path, err))?
        .file_type();
    if file_type.is_symlink() {
        return Err(SchemaError::load(&path, "refusing to follow symlink"));
    }
    if !file_type.is_file() {
        return Ok(None);
    }
    if !is_verb(verb) {
        return Err(SchemaError::load(&path, "file name is not a verb"));
    }
    Ok(Some((verb.to_string(), path)))
}

fn is_verb(stem: &str) -> bool {
    (1..=MAX_VERB_LEN).contains(&stem.len())
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn read_bounded(path: &Path, max_bytes: usize) -> Result<String> {
    let file = File::open(path).map_err(|err| SchemaError::load(path, err))?;

    let limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut source = String::new();
    file.take(limit)
        .read_to_string(&mut source)
        .map_err(|err| SchemaError::load(path, err))?;

    if source.len() > max_bytes {
        return Err(SchemaError::load(
            path,
            format!("larger than {max_bytes} bytes"),
        ));
    }
    Ok(source)
}

/// Add `additionalProperties: false` to every object schema that does not
/// already say otherwise, recursing through subschemas.
fn close_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for keyword in MAP_KEYWORDS {
                if let Some(Value::Object(children)) = map.get_mut(keyword) {
                    children.values_mut().for_each(close_object_schemas);
                }
            }
            for keyword in NESTED_KEYWORDS {
                if let Some(child) = map.get_mut(keyword) {
                    close_object_schemas(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_object_schemas),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "object"),
        _ => ["properties", "required", "patternProperties"]
            .iter()
            .any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const CREATE_WINDOW_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "title": { "type": "string" }
        },
        "required": ["id", "title"]
    }"#;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "guibridge-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn register_and_validate() {
        let mut registry = VerbSchemaRegistry::new();
        registry
            .register("createWindow", CREATE_WINDOW_SCHEMA)
            .unwrap();

        assert!(registry
            .validate("createWindow", &json!({"id": "w1", "title": "Main"}))
            .is_ok());
        assert!(matches!(
            registry.validate("createWindow", &json!({"id": 7, "title": "Main"})),
            Err(SchemaError::Rejected { verb, .. }) if verb == "createWindow"
        ));
    }

    #[test]
    fn missing_schema_permissive_passes() {
        let registry = VerbSchemaRegistry::new();
        assert!(registry.validate("showWindow", &json!({})).is_ok());
    }

    #[test]
    fn missing_schema_strict_fails() {
        let registry = VerbSchemaRegistry::with_config(RegistryConfig::default().with_required_schemas(true));
        assert!(matches!(
            registry.validate("showWindow", &json!({})),
            Err(SchemaError::NoSchema(verb)) if verb == "showWindow"
        ));
    }

    #[test]
    fn strict_mode_rejects_unknown_properties() {
        let mut registry = VerbSchemaRegistry::with_config(RegistryConfig::default().with_strict(true));
        registry
            .register("createWindow", CREATE_WINDOW_SCHEMA)
            .unwrap();

        assert!(registry
            .validate(
                "createWindow",
                &json!({"id": "w1", "title": "Main", "extra": true})
            )
            .is_err());
    }

    #[test]
    fn strict_mode_reaches_nested_objects() {
        let mut value = json!({
            "type": "object",
            "properties": {
                "size": { "type": "object", "properties": { "w": { "type": "number" } } }
            },
            "anyOf": [{ "required": ["size"] }]
        });
        close_object_schemas(&mut value);

        assert_eq!(value["additionalProperties"], json!(false));
        assert_eq!(
            value["properties"]["size"]["additionalProperties"],
            json!(false)
        );
        assert_eq!(value["anyOf"][0]["additionalProperties"], json!(false));
    }

    #[test]
    fn strict_mode_keeps_explicit_additional_properties() {
        let mut value = json!({ "type": "object", "additionalProperties": true });
        close_object_schemas(&mut value);
        assert_eq!(value["additionalProperties"], json!(true));
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let mut registry = VerbSchemaRegistry::new();
        let err = registry
            .register("createWindow", r#"{"type": 12}"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Compile { .. }));
    }

    #[test]
    fn from_embedded_registers_each_verb() {
        let registry = VerbSchemaRegistry::from_embedded(&[
            ("createWindow", CREATE_WINDOW_SCHEMA),
            ("quit", r#"{"type":"object"}"#),
        ])
        .unwrap();

        assert_eq!(registry.verbs(), vec!["createWindow", "quit"]);
        assert!(registry.has_schema("quit"));
        assert!(!registry.has_schema("showWindow"));
    }

    #[test]
    fn loads_directory_of_verb_schemas() {
        let dir = unique_temp_dir("load");
        std::fs::write(dir.join("createWindow.schema.json"), CREATE_WINDOW_SCHEMA).unwrap();
        std::fs::write(dir.join("README.md"), "not a schema").unwrap();

        let registry = VerbSchemaRegistry::from_directory(&dir).unwrap();
        assert_eq!(registry.verbs(), vec!["createWindow"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_unrecognized_schema_filename() {
        let dir = unique_temp_dir("badname");
        std::fs::write(dir.join("create window.schema.json"), "{}").unwrap();

        let err = VerbSchemaRegistry::from_directory(&dir).unwrap_err();
        assert!(matches!(err, SchemaError::Load { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_oversized_schema_file() {
        let dir = unique_temp_dir("oversized");
        std::fs::write(
            dir.join("quit.schema.json"),
            format!(r#"{{"description":"{}"}}"#, "x".repeat(128)),
        )
        .unwrap();

        let err = VerbSchemaRegistry::from_directory_with_config(
            &dir,
            RegistryConfig {
                max_file_bytes: 64,
                ..RegistryConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Load { reason, .. } if reason.contains("larger than 64")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn refuses_symlinked_schema() {
        let dir = unique_temp_dir("symlink");
        let target = dir.join("target.json");
        std::fs::write(&target, CREATE_WINDOW_SCHEMA).unwrap();
        std::os::unix::fs::symlink(&target, dir.join("createWindow.schema.json")).unwrap();

        let err = VerbSchemaRegistry::from_directory(&dir).unwrap_err();
        assert!(matches!(err, SchemaError::Load { reason, .. } if reason.contains("symlink")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_fails() {
        let err = VerbSchemaRegistry::from_directory(Path::new("/nonexistent/guibridge-schemas"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Load { .. }));
    }
}

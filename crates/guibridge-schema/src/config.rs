/// Default cap on schema files read from one directory.
pub const DEFAULT_MAX_SCHEMA_FILES: usize = 256;

/// Default cap on the size of a single schema file.
pub const DEFAULT_MAX_SCHEMA_BYTES: usize = 256 * 1024;

/// How schemas are loaded and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Close every object schema to unknown properties at registration.
    pub strict: bool,
    /// Reject verbs that have no schema instead of letting them through.
    pub require_schema: bool,
    pub max_files: usize,
    pub max_file_bytes: usize,
}

impl RegistryConfig {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_required_schemas(mut self, required: bool) -> Self {
        self.require_schema = required;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict: false,
            require_schema: false,
            max_files: DEFAULT_MAX_SCHEMA_FILES,
            max_file_bytes: DEFAULT_MAX_SCHEMA_BYTES,
        }
    }
}

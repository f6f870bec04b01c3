use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::toolkit::{Widget, WidgetKind, WidgetSpec, WindowHandle};

/// One id namespace of the object registry.
///
/// Every operation takes the keyspace lock for its own duration only, so
/// callers never hold it across toolkit or channel calls. A lookup racing a
/// `put` on the same id sees either the old or the new value.
pub struct Keyspace<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> Keyspace<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub fn put(&self, id: impl Into<String>, value: V) -> Option<V> {
        self.entries.write().insert(id.into(), value)
    }

    pub fn get(&self, id: &str) -> Option<V> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn delete(&self, id: &str) -> Option<V> {
        self.entries.write().remove(id)
    }

    /// Edit an entry in place. Returns `false`, without calling `edit`, when
    /// the id is absent.
    pub fn update<F>(&self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        match self.entries.write().get_mut(id) {
            Some(value) => {
                edit(value);
                true
            }
            None => false,
        }
    }

    /// All ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Point-in-time copy of every entry, sorted by id.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let mut entries: Vec<(String, V)> = self
            .entries
            .read()
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone> Default for Keyspace<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Keyspace<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyspace")
            .field("len", &self.entries.read().len())
            .finish()
    }
}

/// Per-widget bookkeeping used by the inspection verbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetMetadata {
    pub kind: WidgetKind,
    pub placeholder: Option<String>,
    pub custom_id: Option<String>,
    pub parent_id: Option<String>,
}

impl WidgetMetadata {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            placeholder: None,
            custom_id: None,
            parent_id: None,
        }
    }

    /// Metadata derived from the spec a widget was built from.
    pub fn from_spec(spec: &WidgetSpec) -> Self {
        let mut metadata = Self::new(spec.kind());
        if let WidgetSpec::Entry { placeholder } = spec {
            metadata.placeholder = placeholder.clone();
        }
        metadata
    }
}

/// The four keyspaces of live objects, owned by one bridge.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    pub windows: Keyspace<Arc<dyn WindowHandle>>,
    pub widgets: Keyspace<Arc<dyn Widget>>,
    /// Widget id to callback id.
    pub callbacks: Keyspace<String>,
    pub metadata: Keyspace<WidgetMetadata>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a registered widget, synthesizing a bare record for
    /// widgets registered without one.
    pub fn metadata_or_default(&self, id: &str, widget: &dyn Widget) -> WidgetMetadata {
        self.metadata
            .get(id)
            .unwrap_or_else(|| WidgetMetadata::new(widget.kind()))
    }
}

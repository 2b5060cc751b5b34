use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The accumulating key-value result set threaded through a run.
///
/// Keys are the variable names nodes are configured to produce under;
/// values are executor-defined payloads (e.g. `{"text": "..."}` for a
/// text-generation node). The runner owns the context exclusively and
/// passes it by value into each executor, replacing it with the
/// executor's returned value, so no concurrent mutation is possible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    entries: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Consume the context and return it with one additional entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

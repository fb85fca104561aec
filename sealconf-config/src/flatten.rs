//! JSON flattening — nested documents to a flat path-keyed map.
//!
//! `{"a": {"b": 1}}` becomes `{"a:b": "1"}`; arrays contribute zero-based
//! decimal-index segments, so `{"a": [1, 2]}` becomes `{"a:0": "1",
//! "a:1": "2"}`.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Separator between path segments in a flat key.
pub const KEY_SEPARATOR: &str = ":";

/// Ordered flat settings map. `None` is the projection of JSON null.
pub type FlatConfigMap = BTreeMap<FlatKey, Option<String>>;

/// A separator-joined settings path.
///
/// Keys compare, order, and hash case-insensitively (ASCII folding) while
/// preserving their original spelling — `"Logging:Level"` and
/// `"logging:level"` are the same key. Duplicate detection during
/// flattening is therefore explicitly case-insensitive.
#[derive(Debug, Clone)]
pub struct FlatKey(String);

impl FlatKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for FlatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for FlatKey {}

impl Ord for FlatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = other.0.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

impl PartialOrd for FlatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for FlatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl std::fmt::Display for FlatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlatKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Parses `text` as JSON and flattens it into a [`FlatConfigMap`].
///
/// Fails with [`ConfigError::Format`] if the text is not valid JSON or the
/// root is not an object, and with [`ConfigError::DuplicateKey`] if two
/// property paths normalize to the same flat key.
pub fn flatten_json(text: &str) -> ConfigResult<FlatConfigMap> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| ConfigError::Format(e.to_string()))?;
    let Value::Object(object) = &root else {
        return Err(ConfigError::Format(format!(
            "root must be a JSON object, found {}",
            kind_name(&root)
        )));
    };

    let mut flattener = Flattener::default();
    flattener.visit_object(object)?;
    Ok(flattener.data)
}

/// Transient flattening state: the output map plus the segment stack of the
/// path currently being visited.
#[derive(Default)]
struct Flattener {
    data: FlatConfigMap,
    context: Vec<String>,
}

impl Flattener {
    fn visit_object(&mut self, object: &Map<String, Value>) -> ConfigResult<()> {
        for (name, value) in object {
            self.context.push(name.clone());
            self.visit_value(value)?;
            self.context.pop();
        }
        Ok(())
    }

    fn visit_value(&mut self, value: &Value) -> ConfigResult<()> {
        match value {
            Value::Object(object) => self.visit_object(object),
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.context.push(index.to_string());
                    self.visit_value(item)?;
                    self.context.pop();
                }
                Ok(())
            }
            Value::Null => self.insert_scalar(None),
            Value::Bool(b) => self.insert_scalar(Some(b.to_string())),
            Value::Number(n) => self.insert_scalar(Some(n.to_string())),
            Value::String(s) => self.insert_scalar(Some(s.clone())),
        }
    }

    fn insert_scalar(&mut self, value: Option<String>) -> ConfigResult<()> {
        let key = FlatKey::new(self.context.join(KEY_SEPARATOR));
        if self.data.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key.to_string()));
        }
        self.data.insert(key, value);
        Ok(())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

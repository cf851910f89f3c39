//! String-keyed object / array storage and JSON-document round-tripping.
//!
//! `JsonDocStore` holds arrays and objects as compact adjacency lists —
//! one `Vec<ValueSlot>` per array/object — addressed by a dense index
//! (`ArrayLocator`/`ObjectLocator`). Strings embedded in documents are
//! interned through the same `StringStore` the record store and graph
//! use, so a `"name"` key typed once in a document and once in a column
//! series share one locator.

use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};
use crate::strings::StringStore;
use crate::value::Value;

/// Dense index into `JsonDocStore`'s array arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayLocator(u32);

impl ArrayLocator {
    pub fn new(idx: u32) -> Self {
        ArrayLocator(idx)
    }
}

/// Dense index into `JsonDocStore`'s object arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectLocator(u32);

impl ObjectLocator {
    pub fn new(idx: u32) -> Self {
        ObjectLocator(idx)
    }
}

/// One slot in an object's adjacency list: a key locator paired with its
/// value. Arrays reuse the same slot type with `key` unused, rather than
/// keeping two near-identical vector types.
#[derive(Debug, Clone, PartialEq)]
struct ValueSlot {
    key: Option<crate::strings::StringLocator>,
    value: Value,
}

pub struct JsonDocStore {
    arrays: Vec<Vec<ValueSlot>>,
    objects: Vec<Vec<ValueSlot>>,
}

impl JsonDocStore {
    pub fn new() -> Self {
        Self {
            arrays: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn new_array(&mut self) -> ArrayLocator {
        self.arrays.push(Vec::new());
        ArrayLocator::new((self.arrays.len() - 1) as u32)
    }

    pub fn new_object(&mut self) -> ObjectLocator {
        self.objects.push(Vec::new());
        ObjectLocator::new((self.objects.len() - 1) as u32)
    }

    pub fn array_push(&mut self, loc: ArrayLocator, value: Value) {
        self.arrays[loc.0 as usize].push(ValueSlot { key: None, value });
    }

    pub fn array_get(&self, loc: ArrayLocator, idx: usize) -> Option<Value> {
        self.arrays[loc.0 as usize].get(idx).map(|s| s.value.clone())
    }

    pub fn array_len(&self, loc: ArrayLocator) -> usize {
        self.arrays[loc.0 as usize].len()
    }

    pub fn object_set(
        &mut self,
        loc: ObjectLocator,
        key: crate::strings::StringLocator,
        value: Value,
    ) {
        let slots = &mut self.objects[loc.0 as usize];
        if let Some(slot) = slots.iter_mut().find(|s| s.key == Some(key)) {
            slot.value = value;
        } else {
            slots.push(ValueSlot {
                key: Some(key),
                value,
            });
        }
    }

    pub fn object_get(
        &self,
        loc: ObjectLocator,
        key: crate::strings::StringLocator,
    ) -> Option<Value> {
        self.objects[loc.0 as usize]
            .iter()
            .find(|s| s.key == Some(key))
            .map(|s| s.value.clone())
    }

    pub fn object_keys(&self, loc: ObjectLocator) -> Vec<crate::strings::StringLocator> {
        self.objects[loc.0 as usize]
            .iter()
            .filter_map(|s| s.key)
            .collect()
    }

    /// Convert a stored `Value` into an external `serde_json::Value`,
    /// recursively walking array/object locators. The string store is
    /// needed to resolve interned key/string locators back to text.
    pub fn to_json(&self, value: &Value, strings: &StringStore) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::I64(i) => JsonValue::from(*i),
            Value::U64(u) => JsonValue::from(*u),
            Value::F64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Str(s) => JsonValue::String(
                strings
                    .get_str(*s)
                    .unwrap_or_default()
                    .to_string(),
            ),
            Value::Array(loc) => {
                let slots = &self.arrays[loc.0 as usize];
                JsonValue::Array(
                    slots
                        .iter()
                        .map(|slot| self.to_json(&slot.value, strings))
                        .collect(),
                )
            }
            Value::Object(loc) => {
                let slots = &self.objects[loc.0 as usize];
                let mut map = serde_json::Map::with_capacity(slots.len());
                for slot in slots {
                    let key = slot
                        .key
                        .and_then(|k| strings.get_str(k))
                        .unwrap_or_default()
                        .to_string();
                    map.insert(key, self.to_json(&slot.value, strings));
                }
                JsonValue::Object(map)
            }
        }
    }

    /// Parse an external `serde_json::Value` into a stored `Value`,
    /// interning strings and allocating arrays/objects as needed.
    pub fn from_json(
        &mut self,
        json: &JsonValue,
        strings: &mut StringStore,
    ) -> CoreResult<Value> {
        Ok(match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else if let Some(f) = n.as_f64() {
                    Value::F64(f)
                } else {
                    return Err(CoreError::InvalidRule(format!(
                        "unrepresentable JSON number: {n}"
                    )));
                }
            }
            JsonValue::String(s) => Value::Str(strings.intern(s.as_bytes())?),
            JsonValue::Array(items) => {
                let loc = self.new_array();
                for item in items {
                    let v = self.from_json(item, strings)?;
                    self.array_push(loc, v);
                }
                Value::Array(loc)
            }
            JsonValue::Object(map) => {
                let loc = self.new_object();
                for (k, v) in map {
                    let key = strings.intern(k.as_bytes())?;
                    let value = self.from_json(v, strings)?;
                    self.object_set(loc, key, value);
                }
                Value::Object(loc)
            }
        })
    }
}

impl Default for JsonDocStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Typed JSON payload builder (spec §9): replaces the original's variadic
//! `"{s:i, s:s}"` pack format with a fluent builder.

use bytes::Bytes;
use serde_json::{Map, Value};

/// Accumulates key/value pairs into a JSON object payload.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    map: Map<String, Value>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    pub fn str(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.map.insert(key.into(), Value::String(val.into()));
        self
    }

    pub fn int(mut self, key: impl Into<String>, val: i64) -> Self {
        self.map.insert(key.into(), Value::from(val));
        self
    }

    pub fn float(mut self, key: impl Into<String>, val: f64) -> Self {
        self.map.insert(key.into(), Value::from(val));
        self
    }

    pub fn bool(mut self, key: impl Into<String>, val: bool) -> Self {
        self.map.insert(key.into(), Value::Bool(val));
        self
    }

    pub fn raw(mut self, key: impl Into<String>, val: Value) -> Self {
        self.map.insert(key.into(), val);
        self
    }

    /// Finishes the builder, producing the payload bytes.
    pub fn build(self) -> Bytes {
        // Serializing a `Map<String, Value>` cannot fail.
        Bytes::from(serde_json::to_vec(&Value::Object(self.map)).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_object_with_all_fields() {
        let payload = PayloadBuilder::new()
            .str("name", "foo")
            .int("val", 7)
            .bool("ok", true)
            .build();
        let v: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(v["name"], "foo");
        assert_eq!(v["val"], 7);
        assert_eq!(v["ok"], true);
    }
}

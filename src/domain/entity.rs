// Open-ended entity records mirrored from server events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A positioned, identified object in the world (player or monster).
///
/// The server's vocabulary evolves independently of this client, so an entity
/// is an open JSON object with typed accessors for the fields the simulator
/// understands. Fields this client does not know about are kept verbatim and
/// survive merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON value; returns `None` when the value is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// JSON-object union: every key in `patch` overwrites the same key here.
    pub fn merge(&mut self, patch: &Entity) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    // -- typed reads ------------------------------------------------------

    pub fn num(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Boolean read that accepts the server's numeric-bool encoding: JSON
    /// `true` and any nonzero number count as set. Absent keys are false.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        }
    }

    pub fn set_num(&mut self, key: &str, value: f64) {
        self.set(key, json!(value));
    }

    // -- recognized fields ------------------------------------------------

    pub fn id(&self) -> Option<&str> {
        self.text("id")
    }

    pub fn kind(&self) -> Option<&str> {
        self.text("type")
    }

    pub fn mtype(&self) -> Option<&str> {
        self.text("mtype")
    }

    pub fn x(&self) -> f64 {
        self.num("x").unwrap_or_default()
    }

    pub fn y(&self) -> f64 {
        self.num("y").unwrap_or_default()
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.set_num("x", x);
        self.set_num("y", y);
    }

    pub fn speed(&self) -> f64 {
        self.num("speed").unwrap_or_default()
    }

    pub fn moving(&self) -> bool {
        self.flag("moving")
    }

    pub fn rip(&self) -> bool {
        self.flag("rip")
    }

    pub fn dead(&self) -> bool {
        self.flag("dead")
    }

    /// Normalizes the fields the server is known to send as numeric bools.
    /// Today that is `rip` only.
    pub fn sanitize(&mut self) {
        if let Some(Value::Number(n)) = self.0.get("rip") {
            let rip = n.as_f64().is_some_and(|v| v == 1.0);
            self.0.insert("rip".to_string(), Value::Bool(rip));
        }
    }
}

/// Character bounding box injected for every player record.
/// h = horizontal, v = vertical-up, vn = vertical-down.
pub fn player_base() -> Value {
    json!({ "h": 8, "v": 7, "vn": 2 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).expect("object")
    }

    #[test]
    fn merge_overwrites_and_keeps_unknown_keys() {
        let mut base = entity(json!({ "id": "m1", "x": 1.0, "glyph": "?" }));
        base.merge(&entity(json!({ "x": 2.0, "hp": 30 })));

        assert_eq!(base.num("x"), Some(2.0));
        assert_eq!(base.int("hp"), Some(30));
        assert_eq!(base.text("glyph"), Some("?"));
    }

    #[test]
    fn merge_is_idempotent_on_identical_patches() {
        let patch = entity(json!({ "id": "m1", "x": 5.0, "moving": true }));
        let mut once = Entity::new();
        once.merge(&patch);
        let mut twice = once.clone();
        twice.merge(&patch);

        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_normalizes_numeric_rip() {
        let mut up = entity(json!({ "rip": 0 }));
        up.sanitize();
        assert_eq!(up.get("rip"), Some(&Value::Bool(false)));

        let mut down = entity(json!({ "rip": 1 }));
        down.sanitize();
        assert_eq!(down.get("rip"), Some(&Value::Bool(true)));
    }

    #[test]
    fn flag_accepts_numeric_truth() {
        let e = entity(json!({ "afk": 1, "stunned": 0, "moving": true }));
        assert!(e.flag("afk"));
        assert!(!e.flag("stunned"));
        assert!(e.moving());
        assert!(!e.flag("absent"));
    }
}

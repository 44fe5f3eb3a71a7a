//! Ordered parameter mappings as they appear in the descriptor.
//!
//! YAML mappings are read through `serde_yaml::Mapping`, which keeps insertion
//! order; every mapping here is stored as an explicit association list so the
//! order survives into rendered units.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

// ---------------------------------------------------------------------------
// OrderedMap
// ---------------------------------------------------------------------------

/// String-to-string association list with unique keys and stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedMap(Vec<(String, String)>);

impl OrderedMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Replace the value in place if the key exists, append otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Insert only when the key is absent. Returns true if inserted.
    pub fn insert_default(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.contains_key(key) {
            return false;
        }
        self.0.push((key.to_string(), value.into()));
        true
    }

    /// Overlay `other` on top of `self`: its values win, new keys are appended.
    pub fn overlay(&mut self, other: &OrderedMap) {
        for (k, v) in &other.0 {
            self.insert(k.as_str(), v.as_str());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.0.iter_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for OrderedMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
        let mut out = OrderedMap::new();
        for (k, v) in mapping {
            let key = scalar_key(&k).map_err(D::Error::custom)?;
            let value = scalar_value(&key, &v).map_err(D::Error::custom)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// ParamLayer
// ---------------------------------------------------------------------------

/// One scope of parameters (global, service or configuration).
///
/// The `env` key is special: it holds the environment-variable mapping that
/// is rendered as a repeatable block. Everything else must be a scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParamLayer {
    pub scalars: OrderedMap,
    pub env: OrderedMap,
}

impl ParamLayer {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.env.is_empty()
    }
}

impl<'de> Deserialize<'de> for ParamLayer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
        let mut layer = ParamLayer::default();
        for (k, v) in mapping {
            let key = scalar_key(&k).map_err(D::Error::custom)?;
            if key == "env" {
                layer.env = serde_yaml::from_value(v).map_err(D::Error::custom)?;
            } else {
                let value = scalar_value(&key, &v).map_err(D::Error::custom)?;
                layer.scalars.insert(key, value);
            }
        }
        Ok(layer)
    }
}

fn scalar_key(key: &Value) -> Result<String, String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("parameter keys must be scalars, got {other:?}")),
    }
}

fn scalar_value(key: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(format!("parameter '{key}' must be a scalar value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_order_is_preserved() {
        let yaml = "Z: 1\nA: 2\nM: 3\n";
        let map: OrderedMap = serde_yaml::from_str(yaml).unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
    }

    #[test]
    fn scalars_are_stringified() {
        let yaml = "PORT: 8000\nDEBUG: true\nEMPTY:\nNAME: web\n";
        let map: OrderedMap = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(map.get("PORT"), Some("8000"));
        assert_eq!(map.get("DEBUG"), Some("true"));
        assert_eq!(map.get("EMPTY"), Some(""));
        assert_eq!(map.get("NAME"), Some("web"));
    }

    #[test]
    fn nested_values_are_rejected() {
        let yaml = "LIST: [1, 2]\n";
        let err = serde_yaml::from_str::<OrderedMap>(yaml).unwrap_err();
        assert!(err.to_string().contains("must be a scalar"));
    }

    #[test]
    fn overlay_replaces_in_place_and_appends() {
        let mut base: OrderedMap = [("A", "1"), ("B", "2")].into_iter().collect();
        let top: OrderedMap = [("C", "3"), ("A", "9")].into_iter().collect();
        base.overlay(&top);
        let pairs: Vec<_> = base.iter().collect();
        assert_eq!(pairs, vec![("A", "9"), ("B", "2"), ("C", "3")]);
    }

    #[test]
    fn insert_default_never_overrides() {
        let mut map: OrderedMap = [("SOCKET_NAME", "custom.sock")].into_iter().collect();
        assert!(!map.insert_default("SOCKET_NAME", "derived.sock"));
        assert!(map.insert_default("LOGGING_DIR", "/var/log/x"));
        assert_eq!(map.get("SOCKET_NAME"), Some("custom.sock"));
    }

    #[test]
    fn param_layer_splits_env() {
        let yaml = "description: Web\nenv:\n  B: 2\n  A: 1\nWSGI_MODULE: app.wsgi\n";
        let layer: ParamLayer = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(layer.scalars.get("description"), Some("Web"));
        assert_eq!(layer.scalars.get("WSGI_MODULE"), Some("app.wsgi"));
        assert!(!layer.scalars.contains_key("env"));
        let env: Vec<_> = layer.env.iter().collect();
        assert_eq!(env, vec![("B", "2"), ("A", "1")]);
    }

    #[test]
    fn null_layer_is_empty() {
        let layer: ParamLayer = serde_yaml::from_str("~").unwrap();
        assert!(layer.is_empty());
    }

    #[test]
    fn ordered_map_serializes_as_mapping() {
        let map: OrderedMap = [("B", "2"), ("A", "1")].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"B":"2","A":"1"}"#);
    }
}

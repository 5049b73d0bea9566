//! Record path grammar for partial writes.
//!
//! A path addresses a subtree of a record's data with dot-separated keys and
//! bracketed array indices, e.g. `owner.pets[2].name`. Patches set the
//! addressed subtree, creating intermediate containers as needed; erases
//! remove it.

use crate::core::error::{RecordError, RecordResult};
use serde_json::{Map, Value};

/// One segment of a parsed record path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// A parsed record path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl RecordPath {
    /// Parse a path under the dot/bracket grammar.
    pub fn parse(raw: &str) -> RecordResult<Self> {
        let invalid = |message: &str| RecordError::InvalidPath {
            path: raw.to_string(),
            message: message.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        let mut rest = raw;
        loop {
            if let Some(tail) = rest.strip_prefix('[') {
                let close = tail.find(']').ok_or_else(|| invalid("unterminated index segment"))?;
                let index: usize = tail[..close]
                    .parse()
                    .map_err(|_| invalid("index segment is not a number"))?;
                segments.push(PathSegment::Index(index));
                rest = &tail[close + 1..];
            } else {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                if end == 0 {
                    return Err(invalid("empty key segment"));
                }
                segments.push(PathSegment::Key(rest[..end].to_string()));
                rest = &rest[end..];
            }

            if rest.is_empty() {
                break;
            }
            if let Some(tail) = rest.strip_prefix('.') {
                if tail.is_empty() {
                    return Err(invalid("trailing dot"));
                }
                if tail.starts_with('[') {
                    return Err(invalid("index segment must follow its container directly"));
                }
                rest = tail;
            } else if !rest.starts_with('[') {
                return Err(invalid("expected '.' or '[' after segment"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Read the addressed subtree, if present.
    pub fn get<'a>(&self, target: &'a Value) -> Option<&'a Value> {
        let mut current = target;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => current.get(key.as_str())?,
                PathSegment::Index(index) => current.get(*index)?,
            };
        }
        Some(current)
    }

    /// Set the addressed subtree, creating intermediate containers.
    ///
    /// A key segment over a non-object replaces it with an object; an index
    /// segment over a non-array replaces it with an array padded with nulls
    /// up to the index.
    pub fn set(&self, target: &mut Value, value: Value) {
        let mut value = Some(value);
        let mut current = target;
        for (pos, segment) in self.segments.iter().enumerate() {
            let last = pos + 1 == self.segments.len();
            match segment {
                PathSegment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    let map = current.as_object_mut().expect("container is an object");
                    if last {
                        map.insert(key.clone(), value.take().expect("value applied once"));
                        return;
                    }
                    current = map.entry(key.clone()).or_insert(Value::Null);
                }
                PathSegment::Index(index) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    let array = current.as_array_mut().expect("container is an array");
                    while array.len() <= *index {
                        array.push(Value::Null);
                    }
                    if last {
                        array[*index] = value.take().expect("value applied once");
                        return;
                    }
                    current = &mut array[*index];
                }
            }
        }
    }

    /// Remove the addressed subtree. Missing paths are a no-op.
    pub fn erase(&self, target: &mut Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };

        let mut current = target;
        for segment in parents {
            let next = match segment {
                PathSegment::Key(key) => current.get_mut(key.as_str()),
                PathSegment::Index(index) => current.get_mut(*index),
            };
            match next {
                Some(value) => current = value,
                None => return,
            }
        }

        match last {
            PathSegment::Key(key) => {
                if let Some(map) = current.as_object_mut() {
                    map.remove(key);
                }
            }
            PathSegment::Index(index) => {
                if let Some(array) = current.as_array_mut() {
                    if *index < array.len() {
                        array.remove(*index);
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for RecordPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_keys_and_indices() {
        let path = RecordPath::parse("owner.pets[2].name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("owner".to_string()),
                PathSegment::Key("pets".to_string()),
                PathSegment::Index(2),
                PathSegment::Key("name".to_string()),
            ]
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(RecordPath::parse("").is_err());
        assert!(RecordPath::parse("a..b").is_err());
        assert!(RecordPath::parse("a.").is_err());
        assert!(RecordPath::parse("a[1").is_err());
        assert!(RecordPath::parse("a[x]").is_err());
        assert!(RecordPath::parse("a[0]b").is_err());
    }

    #[test]
    fn set_creates_intermediate_containers() {
        let mut data = json!({});
        RecordPath::parse("owner.pets[1].name")
            .unwrap()
            .set(&mut data, json!("rex"));
        assert_eq!(
            data,
            json!({"owner": {"pets": [null, {"name": "rex"}]}})
        );
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut data = json!({"x": 1});
        RecordPath::parse("x").unwrap().set(&mut data, json!(2));
        assert_eq!(data, json!({"x": 2}));
    }

    #[test]
    fn get_reads_nested_value() {
        let data = json!({"a": [{"b": 7}]});
        let path = RecordPath::parse("a[0].b").unwrap();
        assert_eq!(path.get(&data), Some(&json!(7)));
        assert_eq!(RecordPath::parse("a[1].b").unwrap().get(&data), None);
    }

    #[test]
    fn erase_removes_subtree() {
        let mut data = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        RecordPath::parse("a.b").unwrap().erase(&mut data);
        RecordPath::parse("list[1]").unwrap().erase(&mut data);
        assert_eq!(data, json!({"a": {"c": 2}, "list": [1, 3]}));
    }

    #[test]
    fn erase_missing_path_is_noop() {
        let mut data = json!({"a": 1});
        RecordPath::parse("b.c").unwrap().erase(&mut data);
        assert_eq!(data, json!({"a": 1}));
    }
}

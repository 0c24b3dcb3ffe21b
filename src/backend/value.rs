//! Host values flowing through references, arguments and the host tree.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A value produced by evaluating an expression or pulling a reference.
///
/// Strings and objects are reference counted so cloning a value out of a
/// reference is cheap.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value; renders as the empty string and removes attributes
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    /// Property bag, used for component `self` values
    Object(Rc<BTreeMap<String, Value>>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Property lookup. Anything that is not an object yields `Null`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Follow a property path starting at this value.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Value {
        path.iter()
            .fold(self.clone(), |value, key| value.get(key.as_ref()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object]"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from("red").to_string(), "red");
        assert_eq!(Value::from(true).to_string(), "true");
    }

    #[test]
    fn test_get_path_walks_nested_objects() {
        let inner = Value::object([("name", Value::from("x"))]);
        let outer = Value::object([("user", inner)]);

        assert_eq!(outer.get_path(&["user", "name"]), Value::from("x"));
        assert_eq!(outer.get_path(&["user", "missing"]), Value::Null);
        assert_eq!(Value::from(1).get("anything"), Value::Null);
    }
}

//! Format-agnostic structured document consumed by the model loader.

/// A nested key/value and list structure.
///
/// Any structured-document parser can produce one; JSON is supported through
/// `From<serde_json::Value>`. Map entries keep the order the parser yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// An explicit null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Integers are carried as `f64`.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<Document>),
    /// An ordered list of key/value entries.
    Map(Vec<(String, Document)>),
}

impl Document {
    /// Look up `key` in a map. Returns `None` for non-maps and absent keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Return the string if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the number if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the items if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Document]> {
        match self {
            Document::List(items) => Some(items),
            _ => None,
        }
    }

    /// Return the entries if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Document)]> {
        match self {
            Document::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "boolean",
            Document::Number(_) => "number",
            Document::String(_) => "string",
            Document::List(_) => "list",
            Document::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Document::Null,
            Value::Bool(b) => Document::Bool(b),
            // Without arbitrary precision every JSON number has an f64 form.
            Value::Number(n) => Document::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Document::String(s),
            Value::Array(items) => Document::List(items.into_iter().map(Document::from).collect()),
            Value::Object(map) => Document::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Document::from(v)))
                    .collect(),
            ),
        }
    }
}

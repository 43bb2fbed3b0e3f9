//! Schema-driven parsing of whitespace-separated token streams.
//!
//! Engine output interleaves optional fields in whatever order the engine
//! chooses, without lengths or delimiters. A [`Schema`] names the keys we
//! recognize; the value of a key is every token after its first occurrence up
//! to the next recognized key.
//!
//! ```
//! use uci::{parse_line, Schema};
//!
//! let schema = Schema::new()
//!     .scalar("depth")
//!     .nested("score", Schema::new().scalar("cp").scalar("mate"))
//!     .list("pv");
//!
//! let record = parse_line("info depth 7 score cp 21 pv e2e4 e7e5", &schema);
//! assert_eq!(record.int("depth"), Some(7));
//! assert_eq!(record.record("score").and_then(|s| s.int("cp")), Some(21));
//! assert_eq!(record.list("pv"), Some(&["e2e4".to_string(), "e7e5".to_string()][..]));
//! assert!(record.get("nodes").is_none());
//! ```

use serde::Serialize;
use std::collections::BTreeMap;

/// How the span following a key is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// First token coerced to a number when possible; an empty span is a flag.
    Scalar,
    /// Whole span kept verbatim.
    List,
    /// Span rejoined and parsed against another schema.
    Nested(Schema),
}

/// Ordered set of recognized keys and their kinds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<(String, FieldKind)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(self, key: &str) -> Self {
        self.field(key, FieldKind::Scalar)
    }

    pub fn list(self, key: &str) -> Self {
        self.field(key, FieldKind::List)
    }

    pub fn nested(self, key: &str, schema: Schema) -> Self {
        self.field(key, FieldKind::Nested(schema))
    }

    /// Add a key, replacing the kind if the key is already declared.
    pub fn field(mut self, key: &str, kind: FieldKind) -> Self {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = kind,
            None => self.fields.push((key.to_string(), kind)),
        }
        self
    }

    /// Kind declared for `key`, if any.
    pub fn kind(&self, key: &str) -> Option<&FieldKind> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, kind)| kind)
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_key(&self, token: &str) -> bool {
        self.kind(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parsed value of a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Key present with nothing after it.
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Record(Record),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Scalar value rendered back to its token form.
    pub fn to_token(&self) -> Option<String> {
        match self {
            FieldValue::Int(n) => Some(n.to_string()),
            FieldValue::Float(x) => Some(x.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Fields extracted by [`parse_tokens`]. Keys absent from the input are
/// absent here.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_int)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(FieldValue::as_list)
    }

    pub fn record(&self, key: &str) -> Option<&Record> {
        self.get(key).and_then(FieldValue::as_record)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(FieldValue::Flag(true)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_string(), value);
    }
}

/// Tokens following the first occurrence of `key`, up to (not including) the
/// next token found in `keys`. Empty if `key` does not occur.
///
/// ```
/// let tokens: Vec<i32> = (0..20).collect();
/// let keys = [1, 2, 4, 6, 8, 12, 14, 17];
/// assert_eq!(uci::sublist(&tokens, &keys, &8), &[9, 10, 11]);
/// ```
pub fn sublist<'a, T: PartialEq>(tokens: &'a [T], keys: &[T], key: &T) -> &'a [T] {
    let Some(start) = tokens.iter().position(|t| t == key) else {
        return &[];
    };
    let rest = &tokens[start + 1..];
    let len = rest
        .iter()
        .position(|t| keys.contains(t))
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Coerce a token to an integer, then a float, else keep it as text.
pub fn parse_scalar(token: &str) -> FieldValue {
    if let Ok(n) = token.parse::<i64>() {
        FieldValue::Int(n)
    } else if let Ok(x) = token.parse::<f64>() {
        FieldValue::Float(x)
    } else {
        FieldValue::Text(token.to_string())
    }
}

/// Parse a tokenized line against `schema`.
///
/// Never fails: unknown tokens are skipped and unparseable scalars fall back
/// to text.
pub fn parse_tokens<S: AsRef<str>>(tokens: &[S], schema: &Schema) -> Record {
    let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
    let keys: Vec<&str> = schema.keys().collect();
    let mut record = Record::default();

    for (key, kind) in &schema.fields {
        let key = key.as_str();
        if !tokens.contains(&key) {
            continue;
        }
        let span = sublist(&tokens, &keys, &key);
        let value = match kind {
            FieldKind::Scalar => match span.first() {
                None => FieldValue::Flag(true),
                Some(first) => parse_scalar(first),
            },
            FieldKind::List => FieldValue::List(span.iter().map(|s| s.to_string()).collect()),
            FieldKind::Nested(inner) => FieldValue::Record(parse_line(&span.join(" "), inner)),
        };
        record.insert(key, value);
    }

    record
}

/// Split `line` on whitespace and parse it against `schema`.
pub fn parse_line(line: &str, schema: &Schema) -> Record {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    parse_tokens(&tokens, schema)
}

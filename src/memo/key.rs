/// Cache key derivation for memoized calls
///
/// A key is the SHA-256 of a framed byte stream built from:
/// - A format tag (`memobatch-key-v1`)
/// - The logical operation name
/// - Every positional argument, in order
/// - Every named argument as `name=value`, sorted by name
///
/// Arguments are drawn from a closed set of shapes (`Arg`) whose canonical
/// text is fixed, so keys stay stable across runs, machines and releases.
/// Bump `KEY_FORMAT` whenever the canonical form changes.
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Format tag hashed ahead of everything else
pub const KEY_FORMAT: &str = "memobatch-key-v1";

const POSITIONAL_SECTION: &[u8] = b"positional";
const NAMED_SECTION: &[u8] = b"named";

/// Argument value accepted by the cache
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Arg>),
    Record(BTreeMap<String, Arg>),
}

impl Arg {
    /// Canonical text of this argument
    ///
    /// | shape  | text                                            |
    /// |--------|-------------------------------------------------|
    /// | Null   | `null`                                          |
    /// | Bool   | `true` / `false`                                |
    /// | Int    | base 10                                         |
    /// | Float  | shortest round-trip, always `.0` or exponent; `NaN`, `inf`, `-inf` |
    /// | Str    | JSON string literal                             |
    /// | Seq    | `[a,b,c]`                                       |
    /// | Record | `{"k":v,...}` sorted by field name              |
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Arg::Null => out.push_str("null"),
            Arg::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Arg::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            // Debug keeps the fractional part (1.0 vs 1) and round-trips exactly
            Arg::Float(f) => {
                let _ = write!(out, "{:?}", f);
            }
            Arg::Str(s) => out.push_str(&json_string(s)),
            Arg::Seq(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Arg::Record(fields) => {
                out.push('{');
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&json_string(name));
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Null)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(value: Vec<T>) -> Self {
        Arg::Seq(value.into_iter().map(Into::into).collect())
    }
}

/// Positional and named arguments of one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Arg>,
    named: BTreeMap<String, Arg>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument; a repeated name keeps the last value
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn named_args(&self) -> &BTreeMap<String, Arg> {
        &self.named
    }
}

/// Hex-encoded SHA-256 fingerprint of a call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a key from its hex form (64 lowercase hex characters)
    pub fn parse(hex_key: &str) -> Option<Self> {
        let valid = hex_key.len() == 64
            && hex_key
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| CacheKey(hex_key.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the cache key of a call
pub fn derive_key(operation: &str, args: &CallArgs) -> CacheKey {
    let mut hasher = Sha256::new();

    update_framed(&mut hasher, KEY_FORMAT.as_bytes());
    update_framed(&mut hasher, operation.as_bytes());

    update_framed(&mut hasher, POSITIONAL_SECTION);
    hasher.update((args.positional.len() as u64).to_le_bytes());
    for arg in &args.positional {
        update_framed(&mut hasher, arg.canonical().as_bytes());
    }

    // BTreeMap iterates in name order
    update_framed(&mut hasher, NAMED_SECTION);
    hasher.update((args.named.len() as u64).to_le_bytes());
    for (name, value) in &args.named {
        let pair = format!("{}={}", name, value.canonical());
        update_framed(&mut hasher, pair.as_bytes());
    }

    CacheKey(hex::encode(hasher.finalize()))
}

/// Length-prefix a component so neighbours cannot run together
fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

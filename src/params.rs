//! Parameter binding for sqlmapper.
//!
//! A [`Parameters`] set is an ordered mapping from name to (value, declared
//! type, direction), built at the call site and consumed by one statement
//! execution. Output-direction parameters stay readable by name after the
//! call completes; the recorded values are shared between clones of a set,
//! so a caller keeps visibility into a set that was moved into an async call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{MapperError, Result};
use crate::types::{FromValue, SqlType, Value};

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Value flows from the caller into the statement.
    #[default]
    Input,
    /// Value is assigned by the statement and read back afterwards.
    Output,
    /// Both: bound going in, reassigned by the statement.
    InputOutput,
}

impl Direction {
    /// Returns true for `Output` and `InputOutput`.
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output | Self::InputOutput)
    }
}

/// One named parameter in a set.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Name without a sigil (`:`, `@`, `$` prefixes are stripped on entry).
    pub name: String,
    /// Bound value; `Value::Null` for pure output parameters.
    pub value: Value,
    /// Declared type; inferred from the value when not given explicitly.
    pub ty: Option<SqlType>,
    /// Input/output direction.
    pub direction: Direction,
}

/// An ordered, uniquely-named parameter set.
///
/// Built fluently at the call site:
///
/// ```
/// use sqlmapper::{Parameters, SqlType};
///
/// let p = Parameters::new()
///     .with("a", 1)
///     .with("b", 2)
///     .with_output("c", SqlType::Int);
/// assert_eq!(p.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: Vec<Parameter>,
    outputs: Arc<Mutex<HashMap<String, Value>>>,
}

impl Parameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from (name, value) pairs, a property-bag style source.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set = set.with(name, value);
        }
        set
    }

    /// Adds an input parameter; the declared type is inferred from the value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.sql_type();
        self.push(name.into(), value, ty, Direction::Input);
        self
    }

    /// Adds an input parameter with an explicit declared type.
    pub fn with_typed(
        mut self,
        name: impl Into<String>,
        ty: SqlType,
        value: impl Into<Value>,
    ) -> Self {
        self.push(name.into(), value.into(), Some(ty), Direction::Input);
        self
    }

    /// Adds an output-direction parameter of the given type.
    pub fn with_output(mut self, name: impl Into<String>, ty: SqlType) -> Self {
        self.push(name.into(), Value::Null, Some(ty), Direction::Output);
        self
    }

    /// Adds an input/output parameter carrying an initial value.
    pub fn with_in_out(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.sql_type();
        self.push(name.into(), value, ty, Direction::InputOutput);
        self
    }

    fn push(&mut self, name: String, value: Value, ty: Option<SqlType>, direction: Direction) {
        self.entries.push(Parameter {
            name: strip_sigil(&name).to_string(),
            value,
            ty,
            direction,
        });
    }

    /// Number of parameters in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    /// Finds a parameter by name, ignoring case and a leading sigil.
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        let name = strip_sigil(name);
        self.entries
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns true if any parameter has output direction.
    pub fn has_outputs(&self) -> bool {
        self.entries.iter().any(|p| p.direction.is_output())
    }

    /// Checks the set for malformed or duplicate names.
    ///
    /// Runs before any driver call; a failing set is never partially applied.
    pub fn validate(&self) -> Result<()> {
        for p in &self.entries {
            if p.name.is_empty() {
                return Err(MapperError::binding("empty parameter name"));
            }
            if !p.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(MapperError::binding(format!(
                    "malformed parameter name '{}'",
                    p.name
                )));
            }
        }
        for (i, p) in self.entries.iter().enumerate() {
            if self.entries[..i]
                .iter()
                .any(|q| q.name.eq_ignore_ascii_case(&p.name))
            {
                return Err(MapperError::binding(format!(
                    "duplicate parameter name '{}'",
                    p.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves the placeholders `sql` references against this set, in
    /// first-occurrence order.
    ///
    /// Validates the set first. A referenced name missing from the set is a
    /// `Binding` error; set entries the SQL never references are ignored.
    /// Distinct sigils count as distinct placeholders, matching how SQLite
    /// numbers them.
    pub fn ordered_for(&self, sql: &str) -> Result<Vec<&Parameter>> {
        self.validate()?;
        let mut ordered = Vec::new();
        for placeholder in scan_placeholders(sql) {
            let param = self.find(&placeholder.name).ok_or_else(|| {
                MapperError::binding(format!(
                    "statement references parameter '{}' which is not in the set",
                    placeholder.name
                ))
            })?;
            ordered.push(param);
        }
        Ok(ordered)
    }

    /// Records a driver-assigned value for an output-direction parameter.
    ///
    /// Drivers call this after execution. Reporting a name that was not
    /// declared with output direction is an `Execution` error.
    pub fn record_output(&self, name: &str, value: Value) -> Result<()> {
        let param = self.find(name).ok_or_else(|| {
            MapperError::execution(format!(
                "driver reported output for unknown parameter '{}'",
                strip_sigil(name)
            ))
        })?;
        if !param.direction.is_output() {
            return Err(MapperError::execution(format!(
                "driver reported output for non-output parameter '{}'",
                param.name
            )));
        }
        let key = param.name.to_ascii_lowercase();
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, value);
        Ok(())
    }

    /// Reads back an output parameter's value after execution.
    ///
    /// Accepts the name with or without a sigil, so `get("c")` and
    /// `get("@c")` are equivalent.
    pub fn get<T>(&self, name: &str) -> Result<T>
    where
        T: FromValue,
    {
        let param = self.find(name).ok_or_else(|| {
            MapperError::binding(format!("unknown parameter '{}'", strip_sigil(name)))
        })?;
        if !param.direction.is_output() {
            return Err(MapperError::binding(format!(
                "parameter '{}' was not declared with output direction",
                param.name
            )));
        }
        let key = param.name.to_ascii_lowercase();
        let recorded = self
            .outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        match recorded {
            Some(value) => T::from_value(&value),
            None => Err(MapperError::execution(format!(
                "output parameter '{}' has no recorded value",
                param.name
            ))),
        }
    }
}

impl<N, V, const K: usize> From<[(N, V); K]> for Parameters
where
    N: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: [(N, V); K]) -> Self {
        Self::from_pairs(pairs)
    }
}

impl From<()> for Parameters {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

/// Borrowed sets clone in; the clone shares the output cell, so values
/// recorded during execution stay readable from the caller's set.
impl From<&Parameters> for Parameters {
    fn from(params: &Parameters) -> Self {
        params.clone()
    }
}

/// A parameter reference found in SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The reference as written, sigil included (`:a`, `@a`, `$a`).
    pub token: String,
    /// The name with the sigil stripped.
    pub name: String,
}

/// Strips one leading `:`, `@`, or `$` sigil from a parameter name.
pub fn strip_sigil(name: &str) -> &str {
    name.strip_prefix([':', '@', '$']).unwrap_or(name)
}

/// Collects the distinct parameter references in `sql`, in first-occurrence
/// order.
///
/// This is a lexical pass, not a SQL parse: it recognizes `:name`, `@name`,
/// and `$name` outside of string literals (`'…'` with `''` escapes), quoted
/// identifiers (`"…"`), line comments (`-- …`), and block comments
/// (`/* … */`). `$` followed by a digit and `::` casts are left alone.
pub fn scan_placeholders(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut found: Vec<Placeholder> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        // Doubled quote is an escape inside the literal.
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'-' if i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            sigil @ (b':' | b'@' | b'$') => {
                if sigil == b':' && i > 0 && bytes[i - 1] == b':' {
                    // Second half of a `::` cast.
                    i += 1;
                    continue;
                }
                if sigil == b':' && i + 1 < bytes.len() && bytes[i + 1] == b':' {
                    i += 2;
                    continue;
                }
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let is_name = end > start && !bytes[start].is_ascii_digit();
                if is_name {
                    let token = &sql[i..end];
                    if !found.iter().any(|p| p.token == token) {
                        found.push(Placeholder {
                            token: token.to_string(),
                            name: sql[start..end].to_string(),
                        });
                    }
                    i = end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    found
}

use crate::value::{DATE_TIME_FORMAT, Value};
use std::fmt::Write as _;

///
/// CommandEvent
///
/// One command about to be executed: its text, its parameters in binding
/// order and the hash of the connection string it runs against.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CommandEvent {
    pub text: String,
    pub params: Vec<(String, Value)>,
    pub connection_hash: String,
}

impl CommandEvent {
    #[must_use]
    pub const fn new(text: String, params: Vec<(String, Value)>, connection_hash: String) -> Self {
        Self {
            text,
            params,
            connection_hash,
        }
    }

    /// Statement text with every parameter token replaced by its literal.
    ///
    /// For reading logs only; the result is not safe to execute.
    #[must_use]
    pub fn to_raw_sql(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while !rest.is_empty() {
            if let Some((name, value)) = self.token_at(rest) {
                out.push_str(&literal(value));
                rest = &rest[name.len()..];
                continue;
            }

            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }

        out
    }

    /// [`Self::to_raw_sql`] followed by a comment listing each parameter.
    #[must_use]
    pub fn to_raw_sql_with_param_info(&self) -> String {
        let mut out = self.to_raw_sql();
        if self.params.is_empty() {
            return out;
        }

        out.push_str("\n-- params:");
        for (name, value) in &self.params {
            let _ = write!(out, " {name}={} ({})", literal(value), value.kind());
        }

        out
    }

    // longest parameter name that starts `text` and ends on a token boundary
    fn token_at(&self, text: &str) -> Option<(&str, &Value)> {
        self.params
            .iter()
            .filter(|(name, _)| !name.is_empty() && text.starts_with(name.as_str()))
            .filter(|(name, _)| {
                text[name.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
            })
            .max_by_key(|(name, _)| name.len())
            .map(|(name, value)| (name.as_str(), value))
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::DateTime(dt) => format!("'{}'", dt.format(DATE_TIME_FORMAT)),
        Value::Date(date) => format!(
            "'{}'",
            date.and_hms_opt(0, 0, 0)
                .map_or_else(|| date.to_string(), |dt| dt.format(DATE_TIME_FORMAT).to_string())
        ),
        other => other.to_string(),
    }
}

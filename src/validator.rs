use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

/// EMAIL_RX
///
/// The pattern recommended by the WHATWG for `<input type="email">`.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

/// Validator
///
/// Accumulates validation failures for one form submission. Each form type embeds a
/// `Validator` as a plain field and calls `check_field` once per rule.
///
/// A field keeps the *first* message recorded against it; later failures for the same
/// field are dropped so the user sees one actionable message at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    pub field_errors: HashMap<String, String>,
    pub non_field_errors: Vec<String>,
}

impl Validator {
    /// True when neither field nor non-field errors were recorded.
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    /// Records `message` for `key` unless the field already has one.
    pub fn add_field_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(key.into())
            .or_insert_with(|| message.into());
    }

    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

// --- Predicates ---

/// At least one non-whitespace character.
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// At most `n` Unicode scalar values.
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

/// At least `n` Unicode scalar values.
pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::validator::{self, EMAIL_RX, Validator};

// --- Persisted records ---

/// Snippet
///
/// A piece of text visible from `created` until `expires`. Both timestamps are set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// User
///
/// A registered account. `hashed_password` is a bcrypt hash and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

// --- Form submissions ---

/// The only lifetimes, in days, a new snippet may be given.
pub const PERMITTED_EXPIRES: [i64; 3] = [1, 7, 365];

pub const TITLE_MAX_CHARS: usize = 100;
pub const PASSWORD_MIN_CHARS: usize = 8;

const BLANK: &str = "This field cannot be blank";

/// SnippetCreateForm
///
/// Body of `POST /snippets/create`. The embedded validator is filled by `validate`
/// and rendered back to the user alongside the submitted values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetCreateForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub expires: i64,
    #[serde(skip_deserializing, rename = "errors")]
    pub validator: Validator,
}

impl Default for SnippetCreateForm {
    /// A blank create form preselects the one-year lifetime.
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::default(),
        }
    }
}

impl SnippetCreateForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.title), "title", BLANK);
        v.check_field(
            validator::max_chars(&self.title, TITLE_MAX_CHARS),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(validator::not_blank(&self.content), "content", BLANK);
        v.check_field(
            validator::permitted_value(&self.expires, &PERMITTED_EXPIRES),
            "expires",
            "This field must equal 1, 7 or 365",
        );
        v.valid()
    }
}

/// SignupForm
///
/// Body of `POST /users/signup`. The password is accepted but never echoed back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing, rename = "errors")]
    pub validator: Validator,
}

impl SignupForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.name), "name", BLANK);
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.check_field(
            validator::min_chars(&self.password, PASSWORD_MIN_CHARS),
            "password",
            "This field must be at least 8 characters long",
        );
        v.valid()
    }
}

/// LoginForm
///
/// Body of `POST /users/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing, rename = "errors")]
    pub validator: Validator,
}

impl LoginForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.valid()
    }
}

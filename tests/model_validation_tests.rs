use chrono::{TimeZone, Utc};
use snippetbox::{
    models::{LoginForm, SignupForm, SnippetCreateForm},
    render::{JsonRenderer, PageRenderer, RenderError, TemplateData, human_date},
    validator::{EMAIL_RX, Validator, matches, max_chars, min_chars, not_blank, permitted_value},
};
use axum::http::StatusCode;

// --- Validator ---

#[test]
fn test_first_error_for_a_field_wins() {
    let mut v = Validator::default();
    v.check_field(false, "title", "required");
    v.check_field(false, "title", "too long");

    assert_eq!(v.field_errors.get("title").map(String::as_str), Some("required"));
    assert!(!v.valid());
}

#[test]
fn test_non_field_errors_accumulate() {
    let mut v = Validator::default();
    v.check_field(true, "title", "required");
    assert!(v.valid());

    v.add_non_field_error("first");
    v.add_non_field_error("second");
    assert!(!v.valid());
    assert_eq!(v.non_field_errors, vec!["first", "second"]);
}

#[test]
fn test_lengths_count_code_points_not_bytes() {
    let word = "ñandú"; // 5 chars, 7 bytes
    assert!(max_chars(word, 5));
    assert!(!max_chars(word, 4));
    assert!(min_chars(word, 5));
    assert!(!min_chars(word, 6));
}

#[test]
fn test_blank_means_whitespace_only() {
    assert!(!not_blank(""));
    assert!(!not_blank(" \t\n "));
    assert!(not_blank("  x "));
}

#[test]
fn test_permitted_value_rejects_anything_outside_the_set() {
    for days in [1, 7, 365] {
        assert!(permitted_value(&days, &[1, 7, 365]));
    }
    for days in [i64::MIN, -1, 0, 2, 30, 364, 366, i64::MAX] {
        assert!(!permitted_value(&days, &[1, 7, 365]));
    }
}

#[test]
fn test_email_pattern() {
    assert!(matches("alice@example.com", &EMAIL_RX));
    assert!(matches("a.b+tag@sub.example.co", &EMAIL_RX));
    assert!(!matches("alice@", &EMAIL_RX));
    assert!(!matches("alice example.com", &EMAIL_RX));
    assert!(!matches("@example.com", &EMAIL_RX));
}

// --- Forms ---

#[test]
fn test_signup_with_short_password() {
    let mut form = SignupForm {
        name: "A".into(),
        email: "a@x.com".into(),
        password: "short".into(),
        ..Default::default()
    };

    assert!(!form.validate());
    assert_eq!(form.validator.field_errors.len(), 1);
    assert_eq!(
        form.validator.field_errors["password"],
        "This field must be at least 8 characters long"
    );
}

#[test]
fn test_signup_blank_email_reports_blank_first() {
    let mut form = SignupForm {
        name: "A".into(),
        email: "   ".into(),
        password: "long-enough".into(),
        ..Default::default()
    };

    assert!(!form.validate());
    assert_eq!(form.validator.field_errors["email"], "This field cannot be blank");
}

#[test]
fn test_login_form() {
    let mut form = LoginForm {
        email: "not-an-email".into(),
        password: "".into(),
        ..Default::default()
    };

    assert!(!form.validate());
    assert_eq!(
        form.validator.field_errors["email"],
        "This field must be a valid email address"
    );
    assert_eq!(form.validator.field_errors["password"], "This field cannot be blank");
}

#[test]
fn test_snippet_form_defaults_and_limits() {
    let form = SnippetCreateForm::default();
    assert_eq!(form.expires, 365);

    let mut form = SnippetCreateForm {
        title: "é".repeat(100),
        content: "body".into(),
        expires: 7,
        ..Default::default()
    };
    assert!(form.validate());

    let mut form = SnippetCreateForm {
        title: "é".repeat(101),
        content: "body".into(),
        expires: 7,
        ..Default::default()
    };
    assert!(!form.validate());
    assert!(form.validator.field_errors.contains_key("title"));
}

#[test]
fn test_form_values_hide_passwords() {
    let form = LoginForm {
        email: "alice@example.com".into(),
        password: "secret-password".into(),
        ..Default::default()
    };

    let value = serde_json::to_value(&form).unwrap();
    assert_eq!(value["email"], "alice@example.com");
    assert!(value.get("password").is_none());
    assert!(value.get("errors").is_some());
}

// --- Rendering ---

#[test]
fn test_human_date() {
    let t = Utc.with_ymd_and_hms(2024, 3, 17, 10, 15, 0).unwrap();
    assert_eq!(human_date(t), "17 Mar 2024 at 10:15");
}

#[test]
fn test_unknown_page_is_an_error() {
    let renderer = JsonRenderer::new(["home"]);
    let data = TemplateData::default();

    assert!(renderer.render(StatusCode::OK, "home", &data).is_ok());
    let result = renderer.render(StatusCode::OK, "missing", &data);
    assert!(matches!(result, Err(RenderError::UnknownPage(page)) if page == "missing"));
}

#[test]
fn test_render_applies_status() {
    let renderer = JsonRenderer::default();
    let response = renderer
        .render(StatusCode::UNPROCESSABLE_ENTITY, "signup", &TemplateData::default())
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()["content-type"], "application/json");
}

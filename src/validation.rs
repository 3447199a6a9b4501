use lazy_static::lazy_static;
use regex::Regex;

use crate::{auth::password::MIN_PASSWORD_LEN, error::FieldErrors};

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Trimmed non-blank text of at most `max` characters.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, too_long(max));
        return None;
    }
    Some(value.to_string())
}

/// Blank and absent both mean "no value".
pub fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if value.chars().count() > max {
        errors.add(field, too_long(max));
        return None;
    }
    Some(value.to_string())
}

pub fn username(errors: &mut FieldErrors, value: Option<&str>) -> Option<String> {
    let name = required_text(errors, "username", value, 150)?;
    if !USERNAME_RE.is_match(&name) {
        errors.add(
            "username",
            concat!(
                "Enter a valid username. This value may contain only letters, ",
                "numbers, and @/./+/-/_ characters."
            ),
        );
        return None;
    }
    Some(name)
}

/// Empty string when absent.
pub fn email(errors: &mut FieldErrors, value: Option<&str>) -> String {
    let Some(email) = optional_text(errors, "email", value, 254) else {
        return String::new();
    };
    let email = email.to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        errors.add("email", "Enter a valid email address.");
    }
    email
}

pub fn password(errors: &mut FieldErrors, value: Option<&str>) -> Option<String> {
    let Some(password) = value else {
        errors.add("password", REQUIRED);
        return None;
    };
    if password.len() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
        return None;
    }
    Some(password.to_string())
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Option<i32>) -> Option<i32> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    if value < 0 {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    Some(value)
}

pub fn positive(errors: &mut FieldErrors, field: &str, value: Option<i32>) -> Option<i32> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    if value < 1 {
        errors.add(field, "Ensure this value is greater than or equal to 1.");
        return None;
    }
    Some(value)
}

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::{
    auth::{
        dto::{LoginRequest, SignupRequest},
        password::MAX_PASSWORD_BYTES,
    },
    error::FieldError,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLogin {
    pub email: String,
    pub password: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed and lowercased; lookups and uniqueness both use this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// What a request field held, once JSON types are taken into account.
enum Input {
    Absent,
    Text(String),
    /// Present with a non-string type; the error is already recorded.
    Mistyped,
}

fn read(
    value: Option<Value>,
    field: &'static str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Input {
    match value {
        None | Some(Value::Null) => Input::Absent,
        Some(Value::String(s)) => Input::Text(s),
        Some(_) => {
            errors.push(FieldError::new(field, format!("{label} must be a string")));
            Input::Mistyped
        }
    }
}

fn required(
    value: Option<Value>,
    field: &'static str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> String {
    match read(value, field, label, errors) {
        Input::Text(v) if !v.trim().is_empty() => v.trim().to_string(),
        Input::Mistyped => String::new(),
        _ => {
            errors.push(FieldError::new(field, format!("{label} is required")));
            String::new()
        }
    }
}

fn email(value: Option<Value>, errors: &mut Vec<FieldError>) -> String {
    match read(value, "email", "Email", errors) {
        Input::Mistyped => String::new(),
        Input::Absent => {
            errors.push(FieldError::new("email", "A valid email is required"));
            String::new()
        }
        Input::Text(raw) => {
            let email = normalize_email(&raw);
            if !is_valid_email(&email) {
                errors.push(FieldError::new("email", "A valid email is required"));
            }
            email
        }
    }
}

fn check_signup_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    } else if password.len() > MAX_PASSWORD_BYTES {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at most {MAX_PASSWORD_BYTES} bytes long"),
        ));
    }
}

pub fn validate_signup(req: SignupRequest) -> Result<ValidSignup, Vec<FieldError>> {
    let mut errors = Vec::new();
    let firstname = required(req.firstname, "firstname", "First name", &mut errors);
    let lastname = required(req.lastname, "lastname", "Last name", &mut errors);
    let email = email(req.email, &mut errors);
    let password = match read(req.password, "password", "Password", &mut errors) {
        Input::Text(p) => {
            check_signup_password(&p, &mut errors);
            p
        }
        Input::Absent => {
            check_signup_password("", &mut errors);
            String::new()
        }
        Input::Mistyped => String::new(),
    };

    if errors.is_empty() {
        Ok(ValidSignup {
            firstname,
            lastname,
            email,
            password,
        })
    } else {
        Err(errors)
    }
}

pub fn validate_login(req: LoginRequest) -> Result<ValidLogin, Vec<FieldError>> {
    let mut errors = Vec::new();
    let email = email(req.email, &mut errors);
    let password = match read(req.password, "password", "Password", &mut errors) {
        Input::Text(p) if !p.is_empty() => p,
        Input::Mistyped => String::new(),
        _ => {
            errors.push(FieldError::new("password", "Password is required"));
            String::new()
        }
    };

    if errors.is_empty() {
        Ok(ValidLogin { email, password })
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(firstname: &str, lastname: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            firstname: Some(firstname.into()),
            lastname: Some(lastname.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn accepts_valid_signup_and_normalizes_email() {
        let ok = validate_signup(signup(" A ", "B", "  A@B.com ", "secret")).unwrap();
        assert_eq!(ok.firstname, "A");
        assert_eq!(ok.email, "a@b.com");
        assert_eq!(ok.password, "secret");
    }

    #[test]
    fn missing_firstname() {
        let mut req = signup("", "B", "a@b.com", "secret");
        req.firstname = None;
        let errs = validate_signup(req).unwrap_err();
        assert_eq!(fields(&errs), vec!["firstname"]);
        assert_eq!(errs[0].message, "First name is required");
    }

    #[test]
    fn blank_names_count_as_missing() {
        let errs = validate_signup(signup("   ", "\t", "a@b.com", "secret")).unwrap_err();
        assert_eq!(fields(&errs), vec!["firstname", "lastname"]);
    }

    #[test]
    fn rejects_bad_email_syntax() {
        for bad in ["", "plain", "a@b", "@b.com", "a b@c.com", "a@@b.com"] {
            let errs = validate_signup(signup("A", "B", bad, "secret")).unwrap_err();
            assert_eq!(fields(&errs), vec!["email"], "{bad:?}");
        }
    }

    #[test]
    fn password_length_counts_characters() {
        let errs = validate_signup(signup("A", "B", "a@b.com", "12345")).unwrap_err();
        assert_eq!(fields(&errs), vec!["password"]);
        assert!(validate_signup(signup("A", "B", "a@b.com", "123456")).is_ok());
        // six characters, more than six bytes
        assert!(validate_signup(signup("A", "B", "a@b.com", "éééééé")).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let errs = validate_signup(SignupRequest::default()).unwrap_err();
        assert_eq!(fields(&errs), vec!["firstname", "lastname", "email", "password"]);
    }

    #[test]
    fn password_over_bcrypt_limit_is_rejected() {
        let long = format!("{}correct", "a".repeat(72));
        let errs = validate_signup(signup("A", "B", "a@b.com", &long)).unwrap_err();
        assert_eq!(fields(&errs), vec!["password"]);
        assert!(errs[0].message.contains("72"));
        assert!(validate_signup(signup("A", "B", "a@b.com", &"a".repeat(72))).is_ok());
    }

    #[test]
    fn mistyped_field_keeps_other_violations() {
        let req: SignupRequest =
            serde_json::from_str(r#"{"firstname":5,"lastname":"B","email":"bad","password":"1"}"#)
                .unwrap();
        let errs = validate_signup(req).unwrap_err();
        assert_eq!(fields(&errs), vec!["firstname", "email", "password"]);
        assert_eq!(errs[0].message, "First name must be a string");
    }

    #[test]
    fn null_counts_as_missing() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":null,"password":["x"]}"#).unwrap();
        let errs = validate_login(req).unwrap_err();
        assert_eq!(fields(&errs), vec!["email", "password"]);
        assert_eq!(errs[0].message, "A valid email is required");
        assert_eq!(errs[1].message, "Password must be a string");
    }

    #[test]
    fn login_requires_email_and_password() {
        let errs = validate_login(LoginRequest::default()).unwrap_err();
        assert_eq!(fields(&errs), vec!["email", "password"]);

        let ok = validate_login(LoginRequest {
            email: Some("A@B.COM".into()),
            password: Some("x".into()),
        })
        .unwrap();
        assert_eq!(ok.email, "a@b.com");
    }
}

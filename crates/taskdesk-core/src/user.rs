use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{self, JsonText, ValidationErrors};

pub const NAME_MAX_CHARS: usize = 255;
pub const EMAIL_MAX_CHARS: usize = 255;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// A registered account. The password hash lives in [`UserCredentials`] and is
/// never part of this type, so it cannot leak through serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub const FIELDS: &'static [&'static str] = &["name", "email", "password"];

    /// Read a JSON object body; non-string values fail their field.
    pub fn from_json(body: &Map<String, Value>) -> Result<RegisterInput, ValidationErrors> {
        let mut json = JsonText::new(body);
        let input = RegisterInput {
            name: json.field("name"),
            email: json.field("email"),
            password: json.field("password"),
        };
        json.finish(input, Self::FIELDS, RegisterInput::validate)
    }

    pub fn validate(&self) -> Result<NewAccount, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = match validation::non_blank(self.name.as_deref()) {
            None => {
                errors.add("name", validation::required("name"));
                None
            }
            Some(n) if n.chars().count() > NAME_MAX_CHARS => {
                errors.add("name", validation::too_long("name", NAME_MAX_CHARS));
                None
            }
            Some(n) => Some(n.to_string()),
        };

        let email = validate_email(self.email.as_deref(), &mut errors);

        // Passwords are taken verbatim, whitespace included.
        let password = match self.password.as_deref().filter(|p| !p.is_empty()) {
            None => {
                errors.add("password", validation::required("password"));
                None
            }
            Some(p) if p.chars().count() < PASSWORD_MIN_CHARS => {
                errors.add(
                    "password",
                    format!("The password field must be at least {PASSWORD_MIN_CHARS} characters."),
                );
                None
            }
            Some(p) => Some(p.to_string()),
        };

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) if errors.is_empty() => Ok(NewAccount {
                name,
                email,
                password,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub const FIELDS: &'static [&'static str] = &["email", "password"];

    pub fn from_json(body: &Map<String, Value>) -> Result<LoginInput, ValidationErrors> {
        let mut json = JsonText::new(body);
        let input = LoginInput {
            email: json.field("email"),
            password: json.field("password"),
        };
        json.finish(input, Self::FIELDS, LoginInput::validate)
    }

    pub fn validate(&self) -> Result<LoginCredentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = validate_email(self.email.as_deref(), &mut errors);
        let password = match self.password.as_deref().filter(|p| !p.is_empty()) {
            None => {
                errors.add("password", validation::required("password"));
                None
            }
            Some(p) => Some(p.to_string()),
        };
        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => {
                Ok(LoginCredentials { email, password })
            }
            _ => Err(errors),
        }
    }
}

/// Emails are compared case-insensitively, so they are stored lowercased.
fn validate_email(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    match validation::non_blank(raw) {
        None => {
            errors.add("email", validation::required("email"));
            None
        }
        Some(e) if e.chars().count() > EMAIL_MAX_CHARS => {
            errors.add("email", validation::too_long("email", EMAIL_MAX_CHARS));
            None
        }
        Some(e) if !looks_like_email(e) => {
            errors.add("email", "The email field must be a valid email address.");
            None
        }
        Some(e) => Some(e.to_lowercase()),
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

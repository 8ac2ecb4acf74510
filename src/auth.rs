use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which surface a stored token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Admin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub scope: Scope,
    pub token: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::WeakPassword);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginUser {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    token: String,
    #[serde(default)]
    user: Option<LoginUser>,
}

impl LoginResponse {
    pub(crate) fn into_credentials(self) -> Credentials {
        Credentials {
            scope: Scope::User,
            token: self.token,
            user_id: self.user.map(|user| user.id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AdminLoginResponse {
    token: String,
}

impl AdminLoginResponse {
    pub(crate) fn into_credentials(self) -> Credentials {
        Credentials {
            scope: Scope::Admin,
            token: self.token,
            user_id: None,
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_regex().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// At least 8 characters with upper case, lower case, digit and special character.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    static CLASSES: OnceLock<[Regex; 4]> = OnceLock::new();
    let classes = CLASSES.get_or_init(|| {
        [r"[a-z]", r"[A-Z]", r"[0-9]", r"[^A-Za-z0-9]"]
            .map(|pattern| Regex::new(pattern).expect("password pattern is valid"))
    });

    let long_enough = password.chars().count() >= 8;
    if long_enough && classes.iter().all(|class| class.is_match(password)) {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

//! Wire representations of accounts and the validation applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::User;
use crate::error::{AppError, FieldErrors, FIELD_BLANK, FIELD_REQUIRED};

const MAX_NAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;

const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const TOO_LONG: &str = "Ensure this field has no more than 150 characters.";
const EMAIL_TOO_LONG: &str = "Ensure this field has no more than 254 characters.";

/// Public view of an account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            date_joined: user.date_joined(),
            last_login: user.last_login(),
        }
    }
}

/// How a payload is applied: on creation, as a full replacement (PUT) or as a
/// partial update (PATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Replace,
    Partial,
}

/// Writable account fields. Unknown and read-only keys are ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserPayload {
    pub username: Option<String>,
    #[schema(write_only)]
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserPayload {
    pub fn validate(&self, mode: WriteMode) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();

        match self.username.as_deref() {
            None if mode != WriteMode::Partial => errors.add("username", FIELD_REQUIRED),
            None => {}
            Some(username) => {
                if let Some(message) = username_error(username) {
                    errors.add("username", message);
                }
            }
        }

        match self.password.as_deref() {
            None if mode == WriteMode::Create => errors.add("password", FIELD_REQUIRED),
            Some("") => errors.add("password", FIELD_BLANK),
            _ => {}
        }

        if let Some(email) = self.email.as_deref() {
            if email.chars().count() > MAX_EMAIL_LEN {
                errors.add("email", EMAIL_TOO_LONG);
            } else if !email.is_empty() && !is_valid_email(email) {
                errors.add("email", INVALID_EMAIL);
            }
        }

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_NAME_LEN) {
                errors.add(field, TOO_LONG);
            }
        }

        errors.into_result()
    }

    /// Copy the profile fields onto `user`. The password is handled by the
    /// caller since it has to be hashed first.
    pub fn apply_to(&self, user: &mut User, mode: WriteMode) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }

        let fields = [
            (&mut user.email, &self.email),
            (&mut user.first_name, &self.first_name),
            (&mut user.last_name, &self.last_name),
        ];
        for (target, value) in fields {
            match value {
                Some(value) => *target = value.clone(),
                None if mode == WriteMode::Replace => target.clear(),
                None => {}
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    #[schema(write_only)]
    pub password: Option<String>,
}

impl LoginRequest {
    /// Both credentials, or the field errors for the missing ones.
    pub fn credentials(&self) -> Result<(&str, &str), AppError> {
        let mut errors = FieldErrors::new();
        let username = required(&mut errors, "username", self.username.as_deref());
        let password = required(&mut errors, "password", self.password.as_deref());
        errors.into_result()?;

        Ok((username.unwrap_or_default(), password.unwrap_or_default()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

impl RefreshRequest {
    pub fn token(&self) -> Result<&str, AppError> {
        let mut errors = FieldErrors::new();
        let token = required(&mut errors, "refresh", self.refresh.as_deref());
        errors.into_result()?;

        Ok(token.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessToken {
    pub access: String,
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        None => {
            errors.add(field, FIELD_REQUIRED);
            None
        }
        Some("") => {
            errors.add(field, FIELD_BLANK);
            None
        }
        Some(value) => Some(value),
    }
}

fn username_error(username: &str) -> Option<&'static str> {
    if username.is_empty() {
        Some(FIELD_BLANK)
    } else if username.chars().count() > MAX_NAME_LEN {
        Some(TOO_LONG)
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        Some(INVALID_USERNAME)
    } else {
        None
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !local.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

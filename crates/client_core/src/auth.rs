//! Account flows: signup and profile form checks, the Google redirect
//! callback, and the signed-in session kept in the store.

use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::UserId,
    protocol::{AccountSummary, ProfileUpdate, SignupRequest},
};
use storage::{load_json, save_json, KeyValueStore};
use thiserror::Error;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::{navigation::Route, store_keys};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Please fill in all fields")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {} characters long", MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("Current password is required to set a new password")]
    CurrentPasswordRequired,
    #[error("{}", AUTH_FAILED_MESSAGE)]
    CallbackRejected,
}

/// How the account signed in; stored as `regular` or `google`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Google,
}

impl AuthMethod {
    fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Password => "regular",
            AuthMethod::Google => "google",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(AuthMethod::Password),
            "google" => Some(AuthMethod::Google),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<SignupRequest, AuthError> {
        let username = self.username.trim();
        let email = self.email.trim();
        if username.is_empty()
            || email.is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

/// Profile edits. Google accounts keep the email and password managed by
/// Google, so those fields are never sent for them.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

impl ProfileForm {
    pub fn validate(&self, method: AuthMethod) -> Result<ProfileUpdate, AuthError> {
        let mut update = ProfileUpdate {
            username: non_blank(&self.username),
            ..ProfileUpdate::default()
        };
        if method == AuthMethod::Google {
            return Ok(update);
        }

        update.email = non_blank(&self.email);
        let changing_password = !self.current_password.is_empty()
            || !self.new_password.is_empty()
            || !self.confirm_new_password.is_empty();
        if changing_password {
            if self.current_password.is_empty() {
                return Err(AuthError::CurrentPasswordRequired);
            }
            if self.new_password != self.confirm_new_password {
                return Err(AuthError::PasswordMismatch);
            }
            if self.new_password.chars().count() < MIN_PASSWORD_LEN {
                return Err(AuthError::PasswordTooShort);
            }
            update.current_password = Some(self.current_password.clone());
            update.new_password = Some(self.new_password.clone());
        }
        Ok(update)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the query the server appends when redirecting back from Google:
/// `token`, `user_id` and optionally `email` and `username`.
pub fn oauth_callback(query: &str) -> Result<(String, AccountSummary), AuthError> {
    let mut token = None;
    let mut user_id = None;
    let mut email = None;
    let mut username = None;
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        let value = value.trim().to_string();
        match key.as_ref() {
            "token" => token = Some(value),
            "user_id" => user_id = Some(value),
            "email" => email = Some(value),
            "username" => username = Some(value),
            _ => {}
        }
    }

    let token = token
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::CallbackRejected)?;
    let id = user_id
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or(AuthError::CallbackRejected)?;
    Ok((
        token,
        AccountSummary {
            id: UserId(id),
            username: username.unwrap_or_default(),
            email: email.filter(|email| !email.is_empty()),
        },
    ))
}

/// The signed-in account as persisted across runs.
#[derive(Clone)]
pub struct AuthSession {
    store: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, token: &str, user: &AccountSummary, method: AuthMethod) -> Result<()> {
        self.store.set(store_keys::AUTH_TOKEN, token).await?;
        save_json(self.store.as_ref(), store_keys::USER, user).await?;
        self.store
            .set(store_keys::AUTH_METHOD, method.as_str())
            .await?;
        info!(user = %user.username, method = method.as_str(), "signed in");
        Ok(())
    }

    pub async fn user(&self) -> Result<Option<AccountSummary>> {
        load_json(self.store.as_ref(), store_keys::USER).await
    }

    /// Accounts saved without a method signed in with a password.
    pub async fn method(&self) -> Result<AuthMethod> {
        Ok(self
            .store
            .get(store_keys::AUTH_METHOD)
            .await?
            .as_deref()
            .and_then(AuthMethod::parse)
            .unwrap_or(AuthMethod::Password))
    }

    pub async fn update_user(&self, user: &AccountSummary) -> Result<()> {
        save_json(self.store.as_ref(), store_keys::USER, user).await
    }

    pub async fn clear(&self) -> Result<()> {
        for key in [
            store_keys::AUTH_TOKEN,
            store_keys::USER,
            store_keys::AUTH_METHOD,
        ] {
            self.store.remove(key).await?;
        }
        Ok(())
    }

    /// Finishes the Google redirect: saves the session and goes home, or
    /// sends the user back to the login screen with the failure.
    pub async fn complete_oauth_callback(&self, query: &str) -> Result<Route> {
        match oauth_callback(query) {
            Ok((token, user)) => {
                self.save(&token, &user, AuthMethod::Google).await?;
                Ok(Route::Home)
            }
            Err(err) => {
                warn!("google sign-in callback rejected: {err}");
                Ok(Route::LoginFailed {
                    error: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;

use std::collections::HashMap;

use scrape_core::User;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization credentials")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid authentication credentials")]
    Invalid,
}

/// Turns a bearer credential into a caller identity.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<User, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header.trim().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}

/// For flows where identity is required.
pub fn require_user(
    provider: &dyn IdentityProvider,
    header: Option<&str>,
) -> Result<User, AuthError> {
    let header = header.ok_or(AuthError::Missing)?;
    provider.authenticate(bearer_token(header)?)
}

/// For flows where identity is optional: any failure reads as anonymous.
pub fn optional_user(provider: &dyn IdentityProvider, header: Option<&str>) -> Option<User> {
    require_user(provider, header).ok()
}

/// Fixed token table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    users: HashMap<String, User>,
}

impl StaticTokenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user: User) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        self.users.get(token).cloned().ok_or(AuthError::Invalid)
    }
}

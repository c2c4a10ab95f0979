use crate::error::{Error, Result};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated request context, injected by the auth middleware
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: String,
    username: String,
}

impl Ctx {
    pub fn new(user_id: String, username: String) -> Self {
        Self { user_id, username }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Ctx>()
            .cloned()
            .ok_or(Error::AuthFailCtxNotInRequestExt)
    }
}

//! Bearer-token middleware guarding all authenticated routes

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

pub async fn mw_require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    // Format: "Authorization: Bearer <token>"
    let token = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => {
            let value = value.to_str().map_err(|_| Error::AuthFailTokenWrongFormat)?;
            value
                .strip_prefix("Bearer ")
                .ok_or(Error::AuthFailTokenWrongFormat)?
        }
        None => return Err(Error::AuthFailNoToken),
    };

    let user_info = state
        .auth
        .validate_session(token)
        .await
        .map_err(|_| Error::LoginFail)?;

    req.extensions_mut()
        .insert(Ctx::new(user_info.id, user_info.username));

    Ok(next.run(req).await)
}

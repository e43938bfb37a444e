//! Static bearer-token gate (spec §4.1, §6). `/` and `/health` bypass it
//! unconditionally; every other path accepts either the `Authorization:
//! Bearer <T>` header or a `?token=<T>` query parameter.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.auth_token() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/" || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    if bearer_header(&request).is_some_and(|token| token == expected)
        || query_token(&request).is_some_and(|token| token == expected)
    {
        return Ok(next.run(request).await);
    }

    Err(ApiError::Unauthorized)
}

fn bearer_header(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn query_token(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    query_params(query).find_map(|(key, value)| (key == "token").then_some(value))
}

pub(crate) fn query_params(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query.split('&').filter_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = urlencoding::decode(parts.next()?).ok()?.into_owned();
        let value = urlencoding::decode(parts.next().unwrap_or("")).ok()?.into_owned();
        Some((key, value))
    })
}

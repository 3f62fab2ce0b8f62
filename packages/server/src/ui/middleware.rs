//! Authentication gate.
//!
//! `Authorization: Bearer <token>` ヘッダー、またはブラウザの WebSocket 用に
//! `?token=` クエリからトークンを取り出し、認証済みユーザーをリクエストの
//! extension に格納します。

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::{domain::UserId, ui::state::AppState};

/// Identity established by [`require_auth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(request.headers()).or_else(|| query_token(request.uri()));

    match state.authenticator.authenticate(token.as_deref()) {
        Ok(user_id) => {
            tracing::debug!("Authenticated user {} for {}", user_id, request.uri().path());
            request.extensions_mut().insert(AuthenticatedUser(user_id));
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!("Rejected request to {}: {}", request.uri().path(), e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn query_token(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri).ok()?;
    query.token.filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_is_extracted() {
        // テスト項目: Bearer スキームのトークンのみを取り出す
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        // when (操作):
        let bearer = bearer_token(&headers);
        let other = bearer_token(&basic);

        // then (期待する結果):
        assert_eq!(bearer.as_deref(), Some("abc"));
        assert_eq!(other, None);
    }

    #[test]
    fn test_query_token_is_extracted() {
        // テスト項目: クエリ文字列の token を取り出し、他のパラメータは無視する
        // given (前提条件):
        let uri: Uri = "/ws/1?since=x&token=abc".parse().unwrap();
        let without: Uri = "/ws/1".parse().unwrap();

        // when (操作):
        let token = query_token(&uri);
        let missing = query_token(&without);

        // then (期待する結果):
        assert_eq!(token.as_deref(), Some("abc"));
        assert_eq!(missing, None);
    }
}

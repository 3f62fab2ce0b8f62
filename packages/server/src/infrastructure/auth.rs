//! Authenticator implementations
//!
//! トークンの発行・更新・失効は外部の責務です。ここでは発行済みトークンを
//! ユーザー ID に引き当てるだけです。

use std::collections::HashMap;

use crate::domain::{AuthError, Authenticator, UserId};

/// 固定のトークン表で認証する Authenticator
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.tokens
            .get(token)
            .copied()
            .ok_or(AuthError::InvalidToken)
    }
}

/// 開発用: トークン文字列をそのままユーザー ID として信頼する Authenticator
///
/// 本番環境では使用しないこと。
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthenticator;

impl Authenticator for AllowAllAuthenticator {
    fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        UserId::try_from(token).map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> StaticTokenAuthenticator {
        StaticTokenAuthenticator::new(HashMap::from([("secret-a".to_string(), UserId::new(1))]))
    }

    #[test]
    fn test_known_token_resolves_to_user() {
        // テスト項目: 登録済みトークンは対応するユーザー ID に解決される
        // given (前提条件):
        let auth = authenticator();

        // when (操作):
        let result = auth.authenticate(Some("secret-a"));

        // then (期待する結果):
        assert_eq!(result, Ok(UserId::new(1)));
    }

    #[test]
    fn test_missing_and_unknown_tokens_are_rejected() {
        // テスト項目: トークンなし・未知のトークンはそれぞれのエラーになる
        // given (前提条件):
        let auth = authenticator();

        // when (操作):
        let missing = auth.authenticate(None);
        let blank = auth.authenticate(Some("  "));
        let unknown = auth.authenticate(Some("secret-b"));

        // then (期待する結果):
        assert_eq!(missing, Err(AuthError::MissingToken));
        assert_eq!(blank, Err(AuthError::MissingToken));
        assert_eq!(unknown, Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_allow_all_trusts_numeric_token() {
        // テスト項目: AllowAllAuthenticator は数値トークンをそのまま ID として扱う
        // given (前提条件):
        let auth = AllowAllAuthenticator;

        // when (操作):
        let ok = auth.authenticate(Some("5"));
        let bad = auth.authenticate(Some("bob"));

        // then (期待する結果):
        assert_eq!(ok, Ok(UserId::new(5)));
        assert_eq!(bad, Err(AuthError::InvalidToken));
    }
}

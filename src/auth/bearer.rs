use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::{AuthUser, IdentityProvider};
use crate::error::{AppError, AppResult};

/// Token carried in `Authorization: Bearer <token>`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the request's bearer token. Runs on every request; nothing is
/// cached between calls.
pub async fn authenticate(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> AppResult<AuthUser> {
    let token = bearer_token(headers).ok_or_else(|| {
        tracing::debug!("Missing or malformed Authorization header");
        AppError::Unauthorized
    })?;

    match identity.verify_token(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            tracing::warn!("Identity provider returned no user for token");
            Err(AppError::Unauthorized)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token verification failed");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticIdentity;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_strips_prefix() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        assert_eq!(bearer_token(&headers("abc.def")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_authenticate_resolves_known_token() {
        let user = Uuid::new_v4();
        let identity = StaticIdentity::new().with_user("good", user);
        let auth_user = authenticate(&identity, &headers("Bearer good")).await.unwrap();
        assert_eq!(auth_user.id, user);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unknown_token() {
        let identity = StaticIdentity::new();
        let err = authenticate(&identity, &headers("Bearer nope")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_identity() {
        let identity = StaticIdentity::new().with_anonymous("ghost");
        let err = authenticate(&identity, &headers("Bearer ghost")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthUser, IdentityError, IdentityProvider};

/// Asks the platform's identity service who a token belongs to via
/// `GET {base_url}/auth/v1/user`.
#[derive(Clone)]
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Option<Uuid>,
}

impl SupabaseAuth {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthUser>, IdentityError> {
        let response = self
            .client
            .get(self.user_url())
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::Rejected(status.to_string()));
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(status.to_string()));
        }

        let user = response
            .json::<UserResponse>()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(user.id.map(|id| AuthUser { id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_user_url() {
        let auth = SupabaseAuth::new(Client::new(), "https://x.supabase.co/", "key");
        assert_eq!(auth.user_url(), "https://x.supabase.co/auth/v1/user");
    }

    #[test]
    fn test_user_response_without_id() {
        let user: UserResponse = serde_json::from_str(r#"{"aud":"authenticated"}"#).unwrap();
        assert!(user.id.is_none());
    }

    async fn identity_answering(response: ResponseTemplate) -> (MockServer, SupabaseAuth) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
        let auth = SupabaseAuth::new(Client::new(), &server.uri(), "anon-key");
        (server, auth)
    }

    #[tokio::test]
    async fn test_verify_token_returns_user() {
        let id = Uuid::new_v4();
        let (_server, auth) = identity_answering(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": id.to_string(), "aud": "authenticated"})),
        )
        .await;

        assert_eq!(auth.verify_token("user-token").await, Ok(Some(AuthUser { id })));
    }

    #[tokio::test]
    async fn test_verify_token_without_user_id_is_anonymous() {
        let (_server, auth) = identity_answering(
            ResponseTemplate::new(200).set_body_json(json!({"aud": "authenticated"})),
        )
        .await;

        assert_eq!(auth.verify_token("user-token").await, Ok(None));
    }

    #[tokio::test]
    async fn test_verify_token_rejected_on_401() {
        let (_server, auth) = identity_answering(
            ResponseTemplate::new(401).set_body_json(json!({"msg": "invalid JWT"})),
        )
        .await;

        let err = auth.verify_token("user-token").await.unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_verify_token_unavailable_on_5xx() {
        let (_server, auth) = identity_answering(ResponseTemplate::new(503)).await;

        let err = auth.verify_token("user-token").await.unwrap_err();
        assert!(matches!(err, IdentityError::Unavailable(_)));
    }
}

//! Third-party tokens brokered by the identity provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use trellis_config::ConfigStore;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Identity provider returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("No access_token in identity provider response")]
    MissingToken,

    #[error("Identity provider is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for TokenError {
    fn from(e: reqwest::Error) -> Self {
        TokenError::Network(e.to_string())
    }
}

/// Resolves a token alias into a token issued by an external provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch the token stored for `alias`, authenticating as the holder of
    /// `bearer`.
    async fn idp_token(&self, bearer: &str, alias: &str) -> Result<String, TokenError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Reads stored broker tokens from the identity provider:
/// `GET {url_base}/realms/{realm}/broker/{alias}/token`.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl HttpTokenProvider {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn broker_url(&self, alias: &str) -> Result<String, TokenError> {
        let (base, realm) = self
            .config
            .read(|c| (c.identity.url_base.clone(), c.identity.realm.clone()));
        if base.is_empty() || realm.is_empty() {
            return Err(TokenError::NotConfigured);
        }
        Ok(format!(
            "{}/realms/{}/broker/{}/token",
            base.trim_end_matches('/'),
            realm,
            alias
        ))
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn idp_token(&self, bearer: &str, alias: &str) -> Result<String, TokenError> {
        let url = self.broker_url(alias)?;
        debug!(alias, "Requesting brokered token");

        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| TokenError::Network(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TokenError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        parse_access_token(&body).ok_or(TokenError::MissingToken)
    }
}

/// Extract `access_token` from a JSON or form-encoded body.
fn parse_access_token(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        return json
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(String::from);
    }
    url::form_urlencoded::parse(body.trim().as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed alias-to-token map for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, alias: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(alias.into(), token.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn idp_token(&self, _bearer: &str, alias: &str) -> Result<String, TokenError> {
        self.tokens
            .get(alias)
            .cloned()
            .ok_or(TokenError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_config::WorkspaceConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> HttpTokenProvider {
        let mut config = WorkspaceConfig::default();
        config.identity.url_base = base.to_string();
        config.identity.realm = "workspace".to_string();
        HttpTokenProvider::new(Arc::new(ConfigStore::in_memory(config).unwrap()))
    }

    #[test]
    fn test_parse_access_token_json_and_form() {
        assert_eq!(
            parse_access_token(r#"{"access_token":"gh-123","token_type":"bearer"}"#).as_deref(),
            Some("gh-123")
        );
        assert_eq!(
            parse_access_token("access_token=gho_abc&scope=repo&token_type=bearer").as_deref(),
            Some("gho_abc")
        );
        assert_eq!(parse_access_token("scope=repo"), None);
    }

    #[tokio::test]
    async fn test_http_provider_sends_bearer_and_parses_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/workspace/broker/github/token"))
            .and(header("authorization", "Bearer caller-jwt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("access_token=gho_abc&scope=repo"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = provider(&server.uri())
            .idp_token("caller-jwt", "github")
            .await
            .unwrap();
        assert_eq!(token, "gho_abc");
    }

    #[tokio::test]
    async fn test_http_provider_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("not linked"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .idp_token("caller-jwt", "gitlab")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Backend { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_http_provider_requires_configuration() {
        let store = ConfigStore::in_memory(WorkspaceConfig::default()).unwrap();
        let err = HttpTokenProvider::new(Arc::new(store))
            .idp_token("jwt", "github")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotConfigured));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new().with_token("github", "gh-1");
        assert_eq!(provider.idp_token("", "github").await.unwrap(), "gh-1");
        assert!(provider.idp_token("", "gitlab").await.is_err());
    }
}

// OIDC Client - authorization-code login against the configured identity provider
// The id-token is checked against the provider's JWKS, audience, issuer, expiry and session nonce

use std::str::FromStr;

use jsonwebtoken::{
    decode, decode_header,
    jwk::{AlgorithmParameters, Jwk, JwkSet},
    Algorithm, DecodingKey, Header, Validation,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::session::PendingLogin;
use crate::infrastructure::viewer::Identity;

/// Token endpoint response. Only the id-token is used.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    #[allow(dead_code)]
    access_token: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OidcClient {
    http: Client,
    client_name: Option<String>,
    client_id: String,
    client_secret: String,
    issuer: Option<String>,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
    redirect_uri: String,
    scopes: String,
}

impl OidcClient {
    /// Build a client when both the client id and secret are configured.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        let (client_id, client_secret) =
            match (config.client_id.as_ref(), config.client_secret.as_ref()) {
                (Some(id), Some(secret)) => (id.clone(), secret.clone()),
                _ => return None,
            };

        Some(Self {
            http: Client::new(),
            client_name: config.client_name.clone(),
            client_id,
            client_secret,
            issuer: config.issuer.clone(),
            authorization_endpoint: config.authorization_endpoint.clone(),
            token_endpoint: config.token_endpoint.clone(),
            jwks_uri: config.jwks_uri.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        })
    }

    /// Registered client name, falling back to the client id.
    pub fn name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_id)
    }

    /// Provider URL the browser is sent to by `/login`.
    pub fn authorization_url(&self, login: &PendingLogin) -> String {
        let separator = if self.authorization_endpoint.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&nonce={}",
            self.authorization_endpoint,
            separator,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(&login.state),
            urlencoding::encode(&login.nonce),
        )
    }

    /// Exchange an authorization code for a verified identity.
    pub async fn exchange_code(&self, code: &str, nonce: &str) -> AppResult<Identity> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Token request to {} failed: {}", self.token_endpoint, e);
                AppError::Authentication("Failed to reach identity provider".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange failed: {} - {}", status, body);
            return Err(AppError::Authentication(
                "Failed to exchange code for token".to_string(),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse token response: {}", e);
            AppError::Authentication("Failed to parse token response".to_string())
        })?;

        let id_token = token.id_token.ok_or_else(|| {
            AppError::Authentication("Token response carried no id_token".to_string())
        })?;

        let header = decode_header(&id_token)
            .map_err(|e| AppError::Authentication(format!("Malformed id_token: {}", e)))?;
        let (key, algorithm) = self.fetch_signing_key(&header).await?;
        self.verify_id_token(&id_token, &header, &key, algorithm, nonce)
    }

    /// The provider key named by the token header, with the algorithm that key
    /// is published for.
    async fn fetch_signing_key(&self, header: &Header) -> AppResult<(DecodingKey, Algorithm)> {
        let jwks: JwkSet = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                tracing::error!("JWKS request to {} failed: {}", self.jwks_uri, e);
                AppError::Authentication("Failed to fetch provider signing keys".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse JWKS: {}", e);
                AppError::Authentication("Failed to parse provider signing keys".to_string())
            })?;

        let jwk = match header.kid.as_deref() {
            Some(kid) => jwks.find(kid),
            None => jwks.keys.first(),
        }
        .ok_or_else(|| AppError::Authentication("No matching signing key".to_string()))?;

        let algorithm = signing_algorithm(jwk)
            .ok_or_else(|| AppError::Authentication("Signing key has no usable algorithm".to_string()))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AppError::Authentication(format!("Unusable signing key: {}", e)))?;
        Ok((key, algorithm))
    }

    /// Only `algorithm` is accepted, whatever the token header claims.
    fn verify_id_token(
        &self,
        id_token: &str,
        header: &Header,
        key: &DecodingKey,
        algorithm: Algorithm,
        nonce: &str,
    ) -> AppResult<Identity> {
        if header.alg != algorithm {
            return Err(AppError::Authentication(format!(
                "id_token signed with {:?}, key requires {:?}",
                header.alg, algorithm
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[self.client_id.as_str()]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }

        let claims = decode::<Map<String, Value>>(id_token, key, &validation)
            .map_err(|e| AppError::Authentication(format!("Invalid id_token: {}", e)))?
            .claims;

        if claims.get("nonce").and_then(Value::as_str) != Some(nonce) {
            return Err(AppError::Authentication("id_token nonce mismatch".to_string()));
        }

        Identity::from_claims(claims)
            .ok_or_else(|| AppError::Authentication("id_token has no email claim".to_string()))
    }
}

/// Algorithm a JWK may verify: its declared `alg`, else the default for its
/// key type. Encryption-only algorithms yield `None`.
fn signing_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    match jwk.common.key_algorithm {
        Some(declared) => Algorithm::from_str(&declared.to_string()).ok(),
        None => Some(match jwk.algorithm {
            AlgorithmParameters::RSA(_) => Algorithm::RS256,
            AlgorithmParameters::EllipticCurve(_) => Algorithm::ES256,
            AlgorithmParameters::OctetKey(_) => Algorithm::HS256,
            AlgorithmParameters::OctetKeyPair(_) => Algorithm::EdDSA,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use jsonwebtoken::{encode, Algorithm, EncodingKey};
    use serde_json::json;

    const SECRET: &[u8] = b"comments-test-secret-123";
    const SECRET_B64: &str = "Y29tbWVudHMtdGVzdC1zZWNyZXQtMTIz";

    fn auth_config(base: &str) -> AuthConfig {
        AuthConfig {
            client_name: Some("dex".to_string()),
            client_id: Some("comments-app".to_string()),
            client_secret: Some("shh".to_string()),
            issuer: Some("http://issuer.test".to_string()),
            authorization_endpoint: format!("{}/auth", base),
            token_endpoint: format!("{}/token", base),
            jwks_uri: format!("{}/keys", base),
            redirect_uri: "http://localhost:8000/authorize".to_string(),
            scopes: "openid email profile".to_string(),
            moderator_emails: vec![],
        }
    }

    fn client() -> OidcClient {
        OidcClient::from_config(&auth_config("http://provider.test")).unwrap()
    }

    fn signed_token(claims: Value) -> String {
        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims(nonce: &str) -> Value {
        json!({
            "iss": "http://issuer.test",
            "aud": "comments-app",
            "sub": "user-1",
            "email": "kim@example.com",
            "nonce": nonce,
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }

    fn verify(client: &OidcClient, token: &str, nonce: &str) -> AppResult<Identity> {
        let header = decode_header(token).unwrap();
        client.verify_id_token(
            token,
            &header,
            &DecodingKey::from_secret(SECRET),
            Algorithm::HS256,
            nonce,
        )
    }

    #[test]
    fn test_requires_client_credentials() {
        let mut config = auth_config("http://provider.test");
        config.client_secret = None;
        assert!(OidcClient::from_config(&config).is_none());
        assert_eq!(client().name(), "dex");
    }

    #[test]
    fn test_authorization_url() {
        let login = PendingLogin {
            state: "st@te".to_string(),
            nonce: "n1".to_string(),
        };
        let url = client().authorization_url(&login);
        assert!(url.starts_with("http://provider.test/auth?response_type=code&"));
        assert!(url.contains("client_id=comments-app"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauthorize"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=st%40te"));
        assert!(url.ends_with("nonce=n1"));
    }

    #[test]
    fn test_valid_token_yields_identity() {
        let identity = verify(&client(), &signed_token(claims("n1")), "n1").unwrap();
        assert_eq!(identity.email(), "kim@example.com");
        assert_eq!(identity.subject(), Some("user-1"));
    }

    #[test]
    fn test_nonce_mismatch_is_rejected() {
        let result = verify(&client(), &signed_token(claims("n1")), "n2");
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_wrong_audience_or_issuer_is_rejected() {
        let mut other_audience = claims("n1");
        other_audience["aud"] = json!("someone-else");
        assert!(verify(&client(), &signed_token(other_audience), "n1").is_err());

        let mut other_issuer = claims("n1");
        other_issuer["iss"] = json!("http://evil.test");
        assert!(verify(&client(), &signed_token(other_issuer), "n1").is_err());
    }

    #[test]
    fn test_expired_or_emailless_token_is_rejected() {
        let mut expired = claims("n1");
        expired["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(verify(&client(), &signed_token(expired), "n1").is_err());

        let mut no_email = claims("n1");
        no_email.as_object_mut().unwrap().remove("email");
        assert!(verify(&client(), &signed_token(no_email), "n1").is_err());
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let token = signed_token(claims("n1"));
        let header = decode_header(&token).unwrap();
        let result = client().verify_id_token(
            &token,
            &header,
            &DecodingKey::from_secret(b"another-secret"),
            Algorithm::HS256,
            "n1",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_token_algorithm_must_match_key() {
        let mut header = jsonwebtoken::Header::new(Algorithm::HS512);
        header.kid = Some("k1".to_string());
        let token = encode(&header, &claims("n1"), &EncodingKey::from_secret(SECRET)).unwrap();

        let result = verify(&client(), &token, "n1");
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_signing_algorithm_follows_key() {
        let declared: Jwk = serde_json::from_value(
            json!({"kty": "oct", "kid": "k1", "alg": "HS384", "k": SECRET_B64}),
        )
        .unwrap();
        assert_eq!(signing_algorithm(&declared), Some(Algorithm::HS384));

        let undeclared: Jwk =
            serde_json::from_value(json!({"kty": "oct", "kid": "k1", "k": SECRET_B64})).unwrap();
        assert_eq!(signing_algorithm(&undeclared), Some(Algorithm::HS256));

        let encryption: Jwk = serde_json::from_value(
            json!({"kty": "RSA", "alg": "RSA-OAEP", "n": "AQAB", "e": "AQAB"}),
        )
        .unwrap();
        assert_eq!(signing_algorithm(&encryption), None);
    }

    #[tokio::test]
    async fn test_exchange_code_against_provider() {
        let token = signed_token(claims("nonce-xyz"));
        let provider = Router::new()
            .route(
                "/token",
                post(move || {
                    let token = token.clone();
                    async move {
                        Json(json!({
                            "access_token": "at",
                            "token_type": "bearer",
                            "id_token": token,
                        }))
                    }
                }),
            )
            .route(
                "/keys",
                get(|| async {
                    Json(json!({
                        "keys": [{"kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64}]
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, provider).await.unwrap();
        });

        let client = OidcClient::from_config(&auth_config(&base)).unwrap();
        let identity = client.exchange_code("code-1", "nonce-xyz").await.unwrap();
        assert_eq!(identity.email(), "kim@example.com");

        let result = client.exchange_code("code-1", "other-nonce").await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_authentication_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = OidcClient::from_config(&auth_config(&base)).unwrap();
        let result = client.exchange_code("code", "nonce").await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }
}

// ViewerContext - request-scoped caller identity
// Business logic receives this explicitly instead of reading ambient session state

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A verified identity as asserted by the identity provider's id-token.
/// Always carries an email claim; the remaining claims are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    email: String,
    claims: Map<String, Value>,
}

impl Identity {
    /// Build an identity from verified claims. Returns `None` when the claim
    /// set has no usable `email`.
    pub fn from_claims(claims: Map<String, Value>) -> Option<Self> {
        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())?
            .to_string();
        Some(Self { email, claims })
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        let email = email.into();
        let mut claims = Map::new();
        claims.insert("email".to_string(), Value::String(email.clone()));
        Self { email, claims }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.claims.serialize(serializer)
    }
}

#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    pub identity: Option<Identity>,
}

impl ViewerContext {
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            identity: None,
        }
    }

    pub fn authenticated(request_id: impl Into<String>, identity: Identity) -> Self {
        Self {
            request_id: request_id.into(),
            identity: Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.as_ref().map(Identity::email)
    }
}

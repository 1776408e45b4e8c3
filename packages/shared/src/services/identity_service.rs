use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::services::errors::identity_service_errors::IdentityError;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The signed-in user as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl From<IdTokenClaims> for Identity {
    fn from(claims: IdTokenClaims) -> Self {
        Identity {
            uid: claims.sub,
            email: claims.email,
            display_name: claims.name,
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<Identity>;
    fn sign_in(&self, id_token: &str) -> Result<Identity, IdentityError>;
    fn sign_out(&self);
    /// Receives the new state on every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// Accepts HS256 ID tokens signed with a shared secret.
pub struct JwtIdentityProvider {
    secret: String,
    state: watch::Sender<Option<Identity>>,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        let (state, _) = watch::channel(None);
        JwtIdentityProvider {
            secret: secret.to_string(),
            state,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<IdTokenClaims, IdentityError> {
        let decoding_key = DecodingKey::from_secret(self.secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<IdTokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                if token_data.claims.sub.trim().is_empty() {
                    Err(IdentityError::MissingSubject)
                } else {
                    Ok(token_data.claims)
                }
            }
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(IdentityError::ExpiredToken)
                }
                _ => Err(IdentityError::InvalidToken),
            },
        }
    }

    /// Mints a token for `uid`. Used by local tooling and tests.
    pub fn issue_token(
        &self,
        uid: &str,
        email: Option<&str>,
        valid_for: Duration,
    ) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = IdTokenClaims {
            sub: uid.to_string(),
            exp: (now + valid_for).timestamp() as usize,
            iat: now.timestamp() as usize,
            email: email.map(str::to_string),
            name: None,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| IdentityError::JwtError(format!("{:#?}", e)))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn current_user(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn sign_in(&self, id_token: &str) -> Result<Identity, IdentityError> {
        let identity: Identity = match self.verify_token(id_token) {
            Ok(claims) => claims.into(),
            Err(e) => {
                warn!("Sign-in rejected: {}", e);
                return Err(e);
            }
        };
        info!("Signed in as {}", identity.uid);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!("Signed out {}", previous.uid);
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_sign_in_exposes_subject_as_uid() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = provider
            .issue_token("teacher-1", Some("t@school.kr"), Duration::hours(1))
            .unwrap();

        let identity = provider.sign_in(&token).unwrap();

        assert_eq!(identity.uid, "teacher-1");
        assert_eq!(identity.email.as_deref(), Some("t@school.kr"));
        assert_eq!(provider.current_user(), Some(identity));
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = JwtIdentityProvider::new("other")
            .issue_token("teacher-1", None, Duration::hours(1))
            .unwrap();

        assert_eq!(provider.sign_in(&token), Err(IdentityError::InvalidToken));
        assert!(provider.current_user().is_none());
    }

    #[test]
    fn test_rejects_expired_token() {
        let provider = JwtIdentityProvider::new(SECRET);
        let token = provider
            .issue_token("teacher-1", None, Duration::hours(-2))
            .unwrap();

        assert_eq!(provider.sign_in(&token), Err(IdentityError::ExpiredToken));
    }

    #[test]
    fn test_rejects_garbage() {
        let provider = JwtIdentityProvider::new(SECRET);
        assert_eq!(
            provider.sign_in("not-a-token"),
            Err(IdentityError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_sign_in_and_sign_out() {
        let provider = JwtIdentityProvider::new(SECRET);
        let mut auth_state = provider.subscribe();
        let token = provider
            .issue_token("teacher-1", None, Duration::hours(1))
            .unwrap();

        provider.sign_in(&token).unwrap();
        auth_state.changed().await.unwrap();
        assert_eq!(
            auth_state.borrow_and_update().as_ref().map(|i| i.uid.clone()),
            Some("teacher-1".to_string())
        );

        provider.sign_out();
        auth_state.changed().await.unwrap();
        assert!(auth_state.borrow().is_none());
    }
}

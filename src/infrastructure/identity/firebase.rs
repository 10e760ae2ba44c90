//! Firebase ID token verification.
//!
//! Checks follow the identity provider's published rules for ID tokens:
//! RS256 only, a known `kid`, audience equal to the project id, issuer
//! `https://securetoken.google.com/<project>`, unexpired, not issued in the
//! future, and a non-empty subject of at most 128 characters.

use super::keys::KeySource;
use crate::config::IdentityConfig;
use crate::domain::{AuthError, IdentityVerifier, Principal};
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

/// Clock skew tolerated on `exp`, `iat` and `auth_time`, in seconds.
const LEEWAY_SECS: u64 = 60;

const MAX_SUBJECT_LEN: usize = 128;

/// Claims this service reads from an ID token.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

impl From<IdTokenClaims> for Principal {
    fn from(c: IdTokenClaims) -> Self {
        // ---
        Principal {
            id: c.sub,
            email: c.email,
            display_name: c.name,
            avatar_url: c.picture,
            email_verified: c.email_verified,
        }
    }
}

pub struct FirebaseVerifier {
    // ---
    validation: Validation,
    keys: KeySource,
}

impl FirebaseVerifier {
    // ---
    pub fn new(config: &IdentityConfig, keys: KeySource) -> Self {
        // ---
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[config.project_id.as_str()]);
        validation.set_issuer(&[config.issuer()]);
        validation.set_required_spec_claims(&["exp", "iat", "aud", "iss", "sub"]);
        validation.leeway = LEEWAY_SECS;

        Self { validation, keys }
    }
}

fn invalid(reason: impl Into<String>) -> AuthError {
    // ---
    AuthError::InvalidCredential(reason.into())
}

#[async_trait::async_trait]
impl IdentityVerifier for FirebaseVerifier {
    // ---
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        // ---
        let header = decode_header(token).map_err(|e| invalid(format!("malformed token: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(invalid(format!("unexpected algorithm {:?}", header.alg)));
        }

        let kid = header.kid.ok_or_else(|| invalid("token has no key id"))?;

        let key = self
            .keys
            .key_for(&kid)
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?
            .ok_or_else(|| invalid(format!("unknown key id {kid}")))?;

        let claims = decode::<IdTokenClaims>(token, &key, &self.validation)
            .map_err(|e| invalid(e.to_string()))?
            .claims;

        let latest_allowed = Utc::now().timestamp() + LEEWAY_SECS as i64;
        if claims.iat > latest_allowed {
            return Err(invalid("token issued in the future"));
        }
        if claims.auth_time.is_some_and(|t| t > latest_allowed) {
            return Err(invalid("authentication time in the future"));
        }
        if claims.sub.is_empty() || claims.sub.len() > MAX_SUBJECT_LEN {
            return Err(invalid("subject must be 1 to 128 characters"));
        }

        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const SIGNING_KEY: &[u8] = include_bytes!("../../../tests/fixtures/identity_signing_key.pem");
    const FOREIGN_KEY: &[u8] = include_bytes!("../../../tests/fixtures/foreign_signing_key.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../../../tests/fixtures/identity_public_key.pem");
    const KID: &str = "test-key-1";
    const PROJECT: &str = "tryon-test";

    fn verifier() -> FirebaseVerifier {
        // ---
        let config = IdentityConfig {
            project_id: PROJECT.to_string(),
            jwks_url: String::new(),
        };
        let keys = KeySource::from_rsa_pems([(KID, PUBLIC_KEY)]).unwrap();
        FirebaseVerifier::new(&config, keys)
    }

    fn claims() -> Value {
        // ---
        let now = Utc::now().timestamp();
        json!({
            "iss": format!("https://securetoken.google.com/{PROJECT}"),
            "aud": PROJECT,
            "sub": "uid-42",
            "iat": now - 10,
            "exp": now + 3600,
            "auth_time": now - 10,
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "picture": "https://example.com/ada.png",
            "email_verified": true,
        })
    }

    fn sign_with(claims: &Value, kid: Option<&str>, pem: &[u8]) -> String {
        // ---
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
    }

    fn sign(claims: &Value) -> String {
        // ---
        sign_with(claims, Some(KID), SIGNING_KEY)
    }

    async fn assert_invalid(token: &str) {
        // ---
        let result = verifier().verify(token).await;
        assert!(
            matches!(result, Err(AuthError::InvalidCredential(_))),
            "expected InvalidCredential, got {result:?}"
        );
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        // ---
        let principal = verifier().verify(&sign(&claims())).await.unwrap();

        assert_eq!(principal.id, "uid-42");
        assert_eq!(principal.email.as_deref(), Some("ada@example.com"));
        assert_eq!(principal.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            principal.avatar_url.as_deref(),
            Some("https://example.com/ada.png")
        );
        assert!(principal.email_verified);
    }

    #[tokio::test]
    async fn same_identity_gives_same_id() {
        // ---
        let first = verifier().verify(&sign(&claims())).await.unwrap();

        let mut later = claims();
        later["iat"] = json!(Utc::now().timestamp());
        later["name"] = json!("Countess of Lovelace");
        let second = verifier().verify(&sign(&later)).await.unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn optional_profile_claims_default() {
        // ---
        let mut c = claims();
        let map = c.as_object_mut().unwrap();
        map.remove("email");
        map.remove("name");
        map.remove("picture");
        map.remove("email_verified");

        let principal = verifier().verify(&sign(&c)).await.unwrap();
        assert_eq!(principal.email, None);
        assert_eq!(principal.display_name, None);
        assert!(!principal.email_verified);
    }

    #[tokio::test]
    async fn wrong_audience_rejected() {
        // ---
        let mut c = claims();
        c["aud"] = json!("someone-else");
        assert_invalid(&sign(&c)).await;
    }

    #[tokio::test]
    async fn wrong_issuer_rejected() {
        // ---
        let mut c = claims();
        c["iss"] = json!("https://accounts.example.com");
        assert_invalid(&sign(&c)).await;
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        // ---
        let mut c = claims();
        let now = Utc::now().timestamp();
        c["iat"] = json!(now - 7200);
        c["exp"] = json!(now - 3600);
        assert_invalid(&sign(&c)).await;
    }

    #[tokio::test]
    async fn future_issued_token_rejected() {
        // ---
        let mut c = claims();
        c["iat"] = json!(Utc::now().timestamp() + 600);
        assert_invalid(&sign(&c)).await;
    }

    #[tokio::test]
    async fn empty_subject_rejected() {
        // ---
        let mut c = claims();
        c["sub"] = json!("");
        assert_invalid(&sign(&c)).await;
    }

    #[tokio::test]
    async fn foreign_signature_rejected() {
        // ---
        assert_invalid(&sign_with(&claims(), Some(KID), FOREIGN_KEY)).await;
    }

    #[tokio::test]
    async fn unknown_or_missing_kid_rejected() {
        // ---
        assert_invalid(&sign_with(&claims(), Some("rotated-away"), SIGNING_KEY)).await;
        assert_invalid(&sign_with(&claims(), None, SIGNING_KEY)).await;
    }

    #[tokio::test]
    async fn symmetric_algorithm_rejected() {
        // ---
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.to_string());
        let token = encode(&header, &claims(), &EncodingKey::from_secret(PUBLIC_KEY)).unwrap();
        assert_invalid(&token).await;
    }

    #[tokio::test]
    async fn garbage_rejected() {
        // ---
        assert_invalid("not-a-jwt").await;
        assert_invalid("a.b.c").await;
    }
}

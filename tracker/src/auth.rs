//! Admin login and bearer tokens.
//!
//! Tokens are `base64url(claims).base64url(signature)` where the signature is
//! an HMAC-SHA256 over the encoded claims, keyed by the configured secret.

use crate::config::AdminConfig;
use crate::counter;
use crate::metrics_defs::ADMIN_LOGIN_FAILED;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    // seconds since 1970-01-01 00:00:00 UTC
    pub exp: u64,
}

#[derive(Serialize, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

pub struct AdminAuth {
    username: String,
    password: String,
    secret: Vec<u8>,
    ttl_secs: u64,
}

impl AdminAuth {
    pub fn new(config: &AdminConfig) -> Self {
        AdminAuth {
            username: config.username.clone(),
            password: config.password.clone(),
            secret: config.token_secret.as_bytes().to_vec(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        self.login_at(username, password, now())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, now())
    }

    fn login_at(&self, username: &str, password: &str, now: u64) -> Result<IssuedToken, AuthError> {
        // Both comparisons always run.
        let username_ok = self.matches(username, &self.username);
        let password_ok = self.matches(password, &self.password);
        if !(username_ok && password_ok) {
            counter!(ADMIN_LOGIN_FAILED).increment(1);
            return Err(AuthError::InvalidCredentials);
        }

        let claims = Claims {
            sub: self.username.clone(),
            exp: now.saturating_add(self.ttl_secs),
        };
        Ok(IssuedToken {
            token: self.sign(&claims),
            expires_at: claims.exp,
        })
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;

        self.mac(payload.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|json| serde_json::from_slice(&json).ok())
            .ok_or(AuthError::MalformedToken)?;

        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> String {
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.mac(payload.as_bytes()).finalize().into_bytes();
        format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    /// Constant-time comparison through the keyed MAC.
    fn matches(&self, given: &str, expected: &str) -> bool {
        let expected = self.mac(expected.as_bytes()).finalize().into_bytes();
        self.mac(given.as_bytes()).verify_slice(&expected).is_ok()
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(data);
        mac
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn auth(secret: &str) -> AdminAuth {
        AdminAuth::new(&AdminConfig {
            username: "admin".into(),
            password: "hunter2".into(),
            token_secret: secret.into(),
            token_ttl_secs: 600,
        })
    }

    #[test]
    fn test_login_issues_verifiable_token() {
        let auth = auth("secret");
        let issued = auth.login_at("admin", "hunter2", 1_000).unwrap();
        assert_eq!(issued.expires_at, 1_600);

        let claims = auth.verify_at(&issued.token, 1_001).unwrap();
        assert_eq!(
            claims,
            Claims {
                sub: "admin".into(),
                exp: 1_600
            }
        );
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let auth = auth("secret");
        assert_eq!(
            auth.login("admin", "wrong").err(),
            Some(AuthError::InvalidCredentials)
        );
        assert_eq!(
            auth.login("root", "hunter2").err(),
            Some(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_token_expires() {
        let auth = auth("secret");
        let issued = auth.login_at("admin", "hunter2", 1_000).unwrap();
        assert_eq!(auth.verify_at(&issued.token, 1_600), Err(AuthError::Expired));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issued = auth("secret").login_at("admin", "hunter2", 1_000).unwrap();
        assert_eq!(
            auth("another").verify_at(&issued.token, 1_001),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let auth = auth("secret");
        let issued = auth.login_at("admin", "hunter2", 1_000).unwrap();
        let (_, signature) = issued.token.split_once('.').unwrap();

        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin","exp":99999999999}"#);
        assert_eq!(
            auth.verify_at(&format!("{forged}.{signature}"), 1_001),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let auth = AdminAuth::new(&AdminConfig {
            username: "admin".into(),
            password: "hunter2".into(),
            token_secret: "secret".into(),
            token_ttl_secs: u64::MAX,
        });
        let issued = auth.login_at("admin", "hunter2", 1_000).unwrap();
        assert_eq!(issued.expires_at, u64::MAX);
        assert!(auth.verify_at(&issued.token, 1_001).is_ok());
    }

    #[derive(Default)]
    struct LoginFailures(Arc<AtomicU64>);

    impl Recorder for LoginFailures {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == ADMIN_LOGIN_FAILED.name {
                Counter::from_arc(self.0.clone())
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_only_rejected_logins_are_counted() {
        let auth = auth("secret");
        let recorder = LoginFailures::default();
        metrics::with_local_recorder(&recorder, || {
            let issued = auth.login_at("admin", "hunter2", 1_000).unwrap();
            assert_eq!(auth.verify_at(&issued.token, 2_000), Err(AuthError::Expired));
            assert_eq!(auth.verify_at("no-dot", 1_001), Err(AuthError::MalformedToken));
            assert!(auth.login("admin", "wrong").is_err());
        });
        assert_eq!(recorder.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_malformed_tokens() {
        let auth = auth("secret");
        assert_eq!(auth.verify("no-dot"), Err(AuthError::MalformedToken));
        assert_eq!(auth.verify("abc.!!!"), Err(AuthError::MalformedToken));
    }
}

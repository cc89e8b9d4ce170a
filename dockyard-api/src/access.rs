//! Access gate: all-or-nothing validation of identity-provider tokens.
//!
//! Tokens arrive in the `CF_Authorization` cookie or the
//! `Cf-Access-Jwt-Assertion` header and must be RS256-signed by one of the
//! issuer's published keys. Without a configured team domain and audience
//! the gate runs in dev mode and lets every request through as
//! [`DEV_IDENTITY`].

use crate::config::Config;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{de::DeserializeOwned, Deserialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const ACCESS_COOKIE: &str = "CF_Authorization";
pub const ACCESS_HEADER: &str = "cf-access-jwt-assertion";
pub const DEV_IDENTITY: &str = "dev@localhost";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

impl Identity {
    pub fn dev() -> Self {
        Self {
            email: DEV_IDENTITY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(Identity),
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("no token")]
    NoToken,
    #[error("malformed token")]
    Malformed,
    #[error("invalid audience")]
    Audience,
    #[error("token expired")]
    Expired,
    #[error("key fetch failed")]
    KeyFetch,
    #[error("unknown key")]
    UnknownKey,
    #[error("invalid signature")]
    Signature,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the issuer's published JWK set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_keys(&self) -> anyhow::Result<JwkSet>;
}

/// Fetches `{team_domain}/cdn-cgi/access/certs`.
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn for_team_domain(team_domain: &str) -> Self {
        let domain = team_domain.trim_end_matches('/');
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };

        Self {
            client: reqwest::Client::new(),
            url: format!("{base}/cdn-cgi/access/certs"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_keys(&self) -> anyhow::Result<JwkSet> {
        debug!(url = %self.url, "Fetching signing keys");
        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(set)
    }
}

struct CachedKeys {
    fetched_at: DateTime<Utc>,
    keys: Arc<JwkSet>,
}

/// Signing keys with a time-to-live. Entries are only replaced once they
/// expire; two concurrent cold misses may both fetch.
pub struct KeyCache {
    ttl: Duration,
    entry: RwLock<Option<CachedKeys>>,
}

impl KeyCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(5)),
            entry: RwLock::new(None),
        }
    }

    pub async fn get(&self, now: DateTime<Utc>) -> Option<Arc<JwkSet>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|cached| now - cached.fetched_at < self.ttl)
            .map(|cached| Arc::clone(&cached.keys))
    }

    pub async fn put(&self, now: DateTime<Utc>, keys: JwkSet) -> Arc<JwkSet> {
        let keys = Arc::new(keys);
        *self.entry.write().await = Some(CachedKeys {
            fetched_at: now,
            keys: Arc::clone(&keys),
        });
        keys
    }
}

enum GateMode {
    Dev,
    Enforced {
        audience: String,
        keys: Arc<dyn KeySource>,
        cache: KeyCache,
    },
}

pub struct AccessGate {
    mode: GateMode,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    /// Gate that allows everything as [`DEV_IDENTITY`].
    pub fn dev() -> Self {
        Self {
            mode: GateMode::Dev,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn enforced(
        audience: impl Into<String>,
        keys: Arc<dyn KeySource>,
        cache: KeyCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mode: GateMode::Enforced {
                audience: audience.into(),
                keys,
                cache,
            },
            clock,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        match (&config.team_domain, &config.audience) {
            (Some(team_domain), Some(audience)) => Self::enforced(
                audience.clone(),
                Arc::new(HttpKeySource::for_team_domain(team_domain)),
                KeyCache::new(std::time::Duration::from_secs(config.key_cache_ttl_secs)),
                Arc::new(SystemClock),
            ),
            _ => Self::dev(),
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        matches!(self.mode, GateMode::Dev)
    }

    pub async fn check(&self, headers: &HeaderMap) -> AccessDecision {
        match self.validate(headers).await {
            Ok(identity) => AccessDecision::Allow(identity),
            Err(reason) => AccessDecision::Deny(reason),
        }
    }

    async fn validate(&self, headers: &HeaderMap) -> Result<Identity, DenyReason> {
        let GateMode::Enforced {
            audience,
            keys,
            cache,
        } = &self.mode
        else {
            return Ok(Identity::dev());
        };

        let token = extract_token(headers).ok_or(DenyReason::NoToken)?;

        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature] = segments.as_slice() else {
            return Err(DenyReason::Malformed);
        };

        let header = jsonwebtoken::decode_header(&token).map_err(|_| DenyReason::Malformed)?;
        let claims: TokenClaims = decode_segment(payload_b64)?;

        if !claims.aud.as_ref().is_some_and(|aud| aud.contains(audience)) {
            return Err(DenyReason::Audience);
        }

        let now = self.clock.now();
        if !claims.exp.is_some_and(|exp| exp > now.timestamp()) {
            return Err(DenyReason::Expired);
        }

        let kid = header.kid.ok_or(DenyReason::UnknownKey)?;
        let key_set = self.signing_keys(keys.as_ref(), cache, now).await?;
        let jwk = key_set.find(&kid).ok_or(DenyReason::UnknownKey)?;

        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|_| DenyReason::Signature)?;
        let message = format!("{header_b64}.{payload_b64}");

        match jsonwebtoken::crypto::verify(signature, message.as_bytes(), &decoding_key, Algorithm::RS256) {
            Ok(true) => {}
            _ => return Err(DenyReason::Signature),
        }

        let email = claims
            .email
            .or(claims.sub)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Identity { email })
    }

    async fn signing_keys(
        &self,
        source: &dyn KeySource,
        cache: &KeyCache,
        now: DateTime<Utc>,
    ) -> Result<Arc<JwkSet>, DenyReason> {
        if let Some(keys) = cache.get(now).await {
            return Ok(keys);
        }

        match source.fetch_keys().await {
            Ok(keys) => Ok(cache.put(now, keys).await),
            Err(e) => {
                warn!(error = %e, "Failed to fetch signing keys");
                Err(DenyReason::KeyFetch)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    aud: Option<Audience>,
    exp: Option<i64>,
    email: Option<String>,
    sub: Option<String>,
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, DenyReason> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| DenyReason::Malformed)?;

    serde_json::from_slice(&bytes).map_err(|_| DenyReason::Malformed)
}

/// Cookie first, then the assertion header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == ACCESS_COOKIE && !value.is_empty()).then(|| value.to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(ACCESS_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; CF_Authorization=abc.def.ghi"));
        headers.insert(ACCESS_HEADER, HeaderValue::from_static("from.header.value"));

        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_token_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("CF_Authorization="));
        headers.insert(ACCESS_HEADER, HeaderValue::from_static("from.header.value"));

        assert_eq!(extract_token(&headers).as_deref(), Some("from.header.value"));
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_audience_accepts_string_or_list() {
        let one: TokenClaims = serde_json::from_str(r#"{"aud":"app","exp":1}"#).unwrap();
        let many: TokenClaims = serde_json::from_str(r#"{"aud":["x","app"],"exp":1}"#).unwrap();
        let none: TokenClaims = serde_json::from_str(r#"{"exp":1}"#).unwrap();

        assert!(one.aud.unwrap().contains("app"));
        assert!(many.aud.unwrap().contains("app"));
        assert!(none.aud.is_none());
    }

    #[test]
    fn test_decode_segment_rejects_garbage() {
        assert_eq!(
            decode_segment::<TokenClaims>("!!!").unwrap_err(),
            DenyReason::Malformed
        );
        // valid base64, not JSON
        assert_eq!(
            decode_segment::<TokenClaims>(&URL_SAFE_NO_PAD.encode("nope")).unwrap_err(),
            DenyReason::Malformed
        );
    }

    #[test]
    fn test_published_key_set_parses_as_jwks() {
        let body = r#"{
            "keys": [{"kid": "k1", "kty": "RSA", "alg": "RS256", "use": "sig", "e": "AQAB", "n": "sXch"}],
            "public_cert": {"kid": "k1", "cert": "-----BEGIN CERTIFICATE-----"}
        }"#;
        let set: JwkSet = serde_json::from_str(body).unwrap();

        assert!(set.find("k1").is_some());
        assert!(set.find("k2").is_none());
    }

    #[test]
    fn test_http_key_source_url() {
        assert_eq!(
            HttpKeySource::for_team_domain("team.cloudflareaccess.com").url(),
            "https://team.cloudflareaccess.com/cdn-cgi/access/certs"
        );
        assert_eq!(
            HttpKeySource::for_team_domain("https://team.example.com/").url(),
            "https://team.example.com/cdn-cgi/access/certs"
        );
    }

    #[tokio::test]
    async fn test_dev_gate_allows_without_token() {
        let gate = AccessGate::dev();
        assert!(gate.is_dev_mode());
        assert_eq!(
            gate.check(&HeaderMap::new()).await,
            AccessDecision::Allow(Identity::dev())
        );
    }

    #[tokio::test]
    async fn test_key_cache_expires_after_ttl() {
        let cache = KeyCache::new(std::time::Duration::from_secs(300));
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert!(cache.get(t0).await.is_none());
        cache.put(t0, JwkSet { keys: vec![] }).await;
        assert!(cache.get(t0 + Duration::seconds(299)).await.is_some());
        assert!(cache.get(t0 + Duration::seconds(300)).await.is_none());
    }
}

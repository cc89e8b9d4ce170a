//! Access gate tests with real RS256 tokens
//!
//! Tokens are signed with the fixture key in `tests/fixtures`; keys are
//! served by a counting fake source and time comes from a manual clock.

mod common;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use chrono::{DateTime, Duration, Utc};
use common::{count_rows, TestClient};
use dockyard_api::access::{Clock, DenyReason, KeyCache, KeySource, ACCESS_HEADER};
use dockyard_api::{AccessDecision, AccessGate, Identity};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const AUDIENCE: &str = "dockyard-console-aud";
const KID: &str = "fixture-key";
const PRIVATE_KEY: &[u8] = include_bytes!("fixtures/test_rsa.pem");
const MODULUS: &str = include_str!("fixtures/test_rsa.n");

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
struct CountingKeySource {
    fetches: AtomicUsize,
    fail: bool,
}

impl CountingKeySource {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for CountingKeySource {
    async fn fetch_keys(&self) -> anyhow::Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("certs endpoint unavailable");
        }
        Ok(serde_json::from_value(json!({
            "keys": [{
                "kty": "RSA",
                "kid": KID,
                "use": "sig",
                "alg": "RS256",
                "n": MODULUS.trim(),
                "e": "AQAB",
            }]
        }))?)
    }
}

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

fn sign_with_kid(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

fn sign(claims: &Value) -> String {
    sign_with_kid(claims, KID)
}

fn claims_for(email: &str) -> Value {
    json!({
        "aud": [AUDIENCE],
        "email": email,
        "exp": (t0() + Duration::hours(1)).timestamp(),
        "iat": t0().timestamp(),
    })
}

fn header_with(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_HEADER, HeaderValue::from_str(token).unwrap());
    headers
}

fn gate(source: Arc<CountingKeySource>, clock: Arc<ManualClock>) -> AccessGate {
    AccessGate::enforced(
        AUDIENCE,
        source,
        KeyCache::new(std::time::Duration::from_secs(300)),
        clock,
    )
}

fn deny(reason: DenyReason) -> AccessDecision {
    AccessDecision::Deny(reason)
}

#[tokio::test]
async fn test_valid_token_in_header_is_allowed() {
    let source = Arc::new(CountingKeySource::default());
    let gate = gate(source.clone(), ManualClock::at(t0()));

    let decision = gate.check(&header_with(&sign(&claims_for("ada@example.com")))).await;

    assert_eq!(
        decision,
        AccessDecision::Allow(Identity {
            email: "ada@example.com".to_string()
        })
    );
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_cookie_token_and_string_audience() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));
    let mut claims = claims_for("ada@example.com");
    claims["aud"] = json!(AUDIENCE);

    let mut headers = HeaderMap::new();
    let cookie = format!("session=x; CF_Authorization={}", sign(&claims));
    headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());

    assert!(matches!(gate.check(&headers).await, AccessDecision::Allow(_)));
}

#[tokio::test]
async fn test_missing_token() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));
    assert_eq!(gate.check(&HeaderMap::new()).await, deny(DenyReason::NoToken));
}

#[tokio::test]
async fn test_wrong_segment_count_is_rejected_before_key_fetch() {
    let source = Arc::new(CountingKeySource::default());
    let gate = gate(source.clone(), ManualClock::at(t0()));

    for token in ["abc", "a.b", "a.b.c.d"] {
        assert_eq!(gate.check(&header_with(token)).await, deny(DenyReason::Malformed));
    }
    // three segments that aren't base64 JSON
    assert_eq!(gate.check(&header_with("x.y.z")).await, deny(DenyReason::Malformed));

    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn test_expired_token_rejected_regardless_of_signature() {
    let source = Arc::new(CountingKeySource::default());
    let clock = ManualClock::at(t0());
    let gate = gate(source.clone(), clock.clone());

    let token = sign(&claims_for("ada@example.com"));
    clock.advance(Duration::hours(2));
    assert_eq!(gate.check(&header_with(&token)).await, deny(DenyReason::Expired));

    // Same expired claims with a garbage signature
    let forged = format!("{}.AAAA", token.rsplit_once('.').unwrap().0);
    assert_eq!(gate.check(&header_with(&forged)).await, deny(DenyReason::Expired));

    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn test_missing_exp_counts_as_expired() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));
    let token = sign(&json!({ "aud": AUDIENCE, "email": "ada@example.com" }));

    assert_eq!(gate.check(&header_with(&token)).await, deny(DenyReason::Expired));
}

#[tokio::test]
async fn test_audience_mismatch() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));

    let mut claims = claims_for("ada@example.com");
    claims["aud"] = json!(["someone-else"]);
    assert_eq!(gate.check(&header_with(&sign(&claims))).await, deny(DenyReason::Audience));

    claims.as_object_mut().unwrap().remove("aud");
    assert_eq!(gate.check(&header_with(&sign(&claims))).await, deny(DenyReason::Audience));
}

#[tokio::test]
async fn test_signature_from_another_token_is_rejected() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));

    let ada = sign(&claims_for("ada@example.com"));
    let eve = sign(&claims_for("eve@example.com"));
    let (ada_signed, _) = ada.rsplit_once('.').unwrap();
    let (_, eve_signature) = eve.rsplit_once('.').unwrap();

    let spliced = format!("{ada_signed}.{eve_signature}");
    assert_eq!(gate.check(&header_with(&spliced)).await, deny(DenyReason::Signature));
}

#[tokio::test]
async fn test_unknown_kid() {
    let gate = gate(Arc::new(CountingKeySource::default()), ManualClock::at(t0()));
    let token = sign_with_kid(&claims_for("ada@example.com"), "rotated-away");

    assert_eq!(gate.check(&header_with(&token)).await, deny(DenyReason::UnknownKey));
}

#[tokio::test]
async fn test_key_fetch_failure() {
    let source = Arc::new(CountingKeySource::failing());
    let gate = gate(source.clone(), ManualClock::at(t0()));
    let token = sign(&claims_for("ada@example.com"));

    assert_eq!(gate.check(&header_with(&token)).await, deny(DenyReason::KeyFetch));
    // Failures aren't cached
    assert_eq!(gate.check(&header_with(&token)).await, deny(DenyReason::KeyFetch));
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_keys_are_cached_until_ttl() {
    let source = Arc::new(CountingKeySource::default());
    let clock = ManualClock::at(t0());
    let gate = gate(source.clone(), clock.clone());
    let token = sign(&claims_for("ada@example.com"));

    for _ in 0..3 {
        assert!(matches!(gate.check(&header_with(&token)).await, AccessDecision::Allow(_)));
    }
    assert_eq!(source.fetches(), 1);

    clock.advance(Duration::seconds(299));
    gate.check(&header_with(&token)).await;
    assert_eq!(source.fetches(), 1);

    clock.advance(Duration::seconds(1));
    assert!(matches!(gate.check(&header_with(&token)).await, AccessDecision::Allow(_)));
    assert_eq!(source.fetches(), 2);
}

/// Enforced gate in front of the full router, pinned to the same clock the
/// test tokens are minted against.
async fn enforced_client() -> TestClient {
    let gate = AccessGate::enforced(
        AUDIENCE,
        Arc::new(CountingKeySource::default()),
        KeyCache::new(std::time::Duration::from_secs(300)),
        ManualClock::at(t0()),
    );
    TestClient::with_gate(gate).await
}

#[tokio::test]
async fn test_router_denies_without_token_but_serves_health() {
    let client = enforced_client().await;

    let (status, body) = client.get_json("/api/containers").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized", "message": "no token" }));

    let (status, body) = client.get_json("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // Unmatched paths are gated too
    let (status, _) = client.get_json("/api/nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_router_records_identity_as_creator() {
    let client = enforced_client().await;
    client
        .store()
        .register_container(dockyard_store::NewContainer::new("svc-a", "Api"))
        .await
        .unwrap();

    let token = sign(&claims_for("ada@example.com"));
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/containers/svc-a/restart")
        .header(ACCESS_HEADER, &token)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = client.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = common::extract_json_body(response).await;
    let job = client
        .store()
        .get_job(body["jobId"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(job.created_by.as_deref(), Some("ada@example.com"));
    assert_eq!(count_rows(&client.pool, "jobs").await, 1);
}

//! End-to-end acquisition against mock HTTP providers.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quantum_oracle::*;

// ─────────────────────── helpers ───────────────────────

fn fetcher() -> Arc<dyn Fetcher> {
    Arc::new(HttpFetcher::new().expect("reqwest client"))
}

fn at(server: &MockServer, source: RandomSource, route: &str) -> SourceEndpoint {
    SourceEndpoint::new(source, format!("{}{route}", server.uri()))
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn anu_binary_then_relay_chain_uses_binary_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/binary"))
        .respond_with(ResponseTemplate::new(200).set_body_string("10110001"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let acquirer = RandomByteAcquirer::new(
        fetcher(),
        vec![
            at(&server, RandomSource::AnuBinary, "/binary"),
            SourceEndpoint::relay(&server.uri()),
        ],
    );

    let got = acquirer.acquire().await.unwrap();
    assert_eq!(got.value, 0b1011_0001);
    assert_eq!(got.label(), "ANU Binary Stream");
}

#[tokio::test]
async fn relay_envelope_is_used_when_binary_stream_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/binary"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RELAY_PATH))
        .and(query_param("source", "lfd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(RelayEnvelope::single(
            77,
            RELAY_TYPE_LFD,
        )))
        .mount(&server)
        .await;

    let acquirer = RandomByteAcquirer::new(
        fetcher(),
        vec![
            at(&server, RandomSource::AnuBinary, "/binary"),
            SourceEndpoint::relay(&server.uri()),
        ],
    )
    .with_rate_limit_policy(RateLimitPolicy::FallThrough);

    let got = acquirer.acquire().await.unwrap();
    assert_eq!(got.value, 77);
    assert_eq!(got.provenance, Provenance::Remote(RandomSource::LfdProxy));
}

#[tokio::test]
async fn timeout_counts_as_source_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"success":true,"data":[1]}"#)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lfd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"qrn":"2a","length":1}"#))
        .mount(&server)
        .await;

    let acquirer = RandomByteAcquirer::new(
        fetcher(),
        vec![
            at(&server, RandomSource::AnuJson, "/slow").with_timeout(Duration::from_millis(200)),
            at(&server, RandomSource::Lfd, "/lfd"),
        ],
    );

    let got = acquirer.acquire().await.unwrap();
    assert_eq!(got.value, 42);
    assert_eq!(got.label(), "LfD QRNG");
}

#[tokio::test]
async fn anu_quota_message_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/anu"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("The QRNG API is limited to 1 requests per minute. For more requests, please visit our website."),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lfd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"qrn":"2a","length":1}"#))
        .expect(0)
        .mount(&server)
        .await;

    let acquirer = RandomByteAcquirer::new(
        fetcher(),
        vec![
            at(&server, RandomSource::AnuJson, "/anu"),
            at(&server, RandomSource::Lfd, "/lfd"),
        ],
    );

    let err = acquirer.acquire().await.unwrap_err();
    assert_eq!(err.retry_after_secs(), Some(DEFAULT_RETRY_AFTER_SECS));
}

#[tokio::test]
async fn malformed_payloads_everywhere_exhaust_the_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/binary"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lfd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"qrn":"2a2b","length":2}"#))
        .mount(&server)
        .await;

    let sources = vec![
        at(&server, RandomSource::AnuBinary, "/binary"),
        at(&server, RandomSource::Lfd, "/lfd"),
    ];

    let err = RandomByteAcquirer::new(fetcher(), sources.clone())
        .acquire()
        .await
        .unwrap_err();
    assert_eq!(err.failures().len(), 2);
    assert!(err
        .failures()
        .iter()
        .all(|f| matches!(f.error, SourceError::Malformed(_))));

    let fallback = RandomByteAcquirer::new(fetcher(), sources)
        .with_exhaustion_policy(ExhaustionPolicy::PseudoRandom)
        .acquire()
        .await
        .unwrap();
    assert_eq!(fallback.provenance, Provenance::PseudoRandom);
}

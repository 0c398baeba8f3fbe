// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! End-to-end pipeline behavior against a scripted transport and a controlled clock.

mod support;

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use pretty_assertions::assert_eq;
use pulse::ClockControl;

use armature::{
    BackoffPolicy, BreakerConfig, Client, Error, RequestOptions, RetryPolicy,
    middleware::{Middleware, MiddlewareChain},
};
use support::{FakeTransport, LogCapture, Scripted};

fn no_jitter_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_backoff(
            BackoffPolicy::new()
                .with_initial_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(60))
                .with_multiplier(2.0)
                .with_jitter(false),
        )
}

fn client(
    transport: &Arc<FakeTransport>,
    control: &ClockControl,
    policy: RetryPolicy,
) -> Client {
    Client::builder("https://api.test")
        .retry_policy(policy)
        .transport(Arc::clone(transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid")
}

#[tokio::test]
async fn rate_limited_twice_then_succeeds_with_exponential_delays() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![], ""),
        Scripted::Status(429, vec![], ""),
        Scripted::Status(200, vec![], "payload"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let response = client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text(), "payload");
    assert_eq!(transport.calls(), 3);

    // Strictly increasing exponential delays, actually slept.
    assert_eq!(
        client.retry_delays(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(
        control.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );

    let stats = client.stats();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.successful_requests, 1);

    let breaker = client.breaker().metrics();
    assert_eq!(breaker.successful_calls, 1);
    assert_eq!(breaker.failed_calls, 0);
}

#[tokio::test]
async fn exhausted_rate_limit_raises_with_attempt_count() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![], "slow down"),
        Scripted::Status(429, vec![], "slow down"),
        Scripted::Status(429, vec![], "slow down"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let error = client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect_err("rate limit exhausts");

    match &error {
        Error::RateLimitExceeded {
            attempts,
            status,
            body,
            retry_after,
            ..
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*status, 429);
            assert_eq!(body, "slow down");
            assert_eq!(*retry_after, None);
        }
        other => panic!("expected RateLimitExceeded, got {other:?}"),
    }

    // Exactly one breaker failure, recorded at exhaustion; intermediate 429s do not count.
    assert_eq!(client.breaker().metrics().failed_calls, 1);
    assert_eq!(client.stats().circuit_breaker_trips, 0);
    assert_eq!(
        control.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn retry_after_wins_over_backoff() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![("retry-after", "5")], ""),
        Scripted::Status(200, vec![], "ok"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let response = client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect("second attempt succeeds");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(control.sleeps(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn retry_after_is_capped() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![("retry-after", "500")], ""),
        Scripted::Status(200, vec![], "ok"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(
        &transport,
        &control,
        no_jitter_policy(3).with_max_retry_after(Duration::from_secs(300)),
    );

    client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect("second attempt succeeds");

    assert_eq!(control.sleeps(), vec![Duration::from_secs(300)]);
}

#[tokio::test]
async fn retry_after_ignored_when_not_respected() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![("retry-after", "5")], ""),
        Scripted::Status(200, vec![], "ok"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(
        &transport,
        &control,
        no_jitter_policy(3).with_respect_retry_after(false),
    );

    client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect("second attempt succeeds");

    // Backoff applies, not the server hint.
    assert_eq!(control.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_rejects_without_attempting() {
    let transport = FakeTransport::new([Scripted::Connect, Scripted::Connect]);
    let control = ClockControl::new().auto_advance(true);
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3).with_retry_on_connection_error(false))
        .breaker(BreakerConfig::new().with_failure_threshold(2))
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    for _ in 0..2 {
        let error = client
            .execute(Method::GET, "/down", RequestOptions::new())
            .await
            .expect_err("connection fails");
        assert!(matches!(error, Error::Connection { .. }));
    }

    // The third call is denied before any transport attempt: the script is already empty,
    // so reaching the transport would panic.
    let error = client
        .execute(Method::GET, "/down", RequestOptions::new())
        .await
        .expect_err("circuit is open");
    match error {
        Error::CircuitOpen { failure_count, .. } => assert_eq!(failure_count, 2),
        other => panic!("expected CircuitOpen, got {other:?}"),
    }

    assert_eq!(transport.calls(), 2);
    assert_eq!(client.stats().circuit_breaker_trips, 1);
    assert_eq!(client.breaker().metrics().rejected_calls, 1);
}

#[tokio::test]
async fn identical_get_is_served_from_cache() {
    let transport = FakeTransport::new([Scripted::Status(
        200,
        vec![("content-type", "application/json")],
        r#"{"id":1}"#,
    )]);
    let control = ClockControl::new().auto_advance(true);
    let cache = Arc::new(stockpile::MemoryCache::new(control.to_clock()));
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3))
        .cache(cache as Arc<dyn stockpile::CacheBackend<armature::CachedResponse>>)
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    let options = || RequestOptions::new().with_param("id", "1");

    let first = client
        .execute(Method::GET, "/u", options())
        .await
        .expect("network fetch succeeds");
    let second = client
        .execute(Method::GET, "/u", options())
        .await
        .expect("cache hit succeeds");

    // One transport attempt total; the second call never touched the network.
    assert_eq!(transport.calls(), 1);
    assert_eq!(first.status(), second.status());
    assert_eq!(first.text(), second.text());

    let stats = client.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    // A cache hit bypasses the attempt loop entirely.
    assert_eq!(stats.total_requests, 1);
}

#[tokio::test]
async fn cache_disabled_per_call_always_fetches() {
    let transport = FakeTransport::new([
        Scripted::Status(200, vec![], "a"),
        Scripted::Status(200, vec![], "b"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let cache = Arc::new(stockpile::MemoryCache::new(control.to_clock()));
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3))
        .cache(cache as Arc<dyn stockpile::CacheBackend<armature::CachedResponse>>)
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    for _ in 0..2 {
        client
            .execute(
                Method::GET,
                "/u",
                RequestOptions::new().with_cache(false),
            )
            .await
            .expect("fetch succeeds");
    }

    assert_eq!(transport.calls(), 2);
    let stats = client.stats();
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.cache_misses, 0);
}

#[tokio::test]
async fn authorization_header_is_never_logged_in_cleartext() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let transport = FakeTransport::new([Scripted::Status(200, vec![], "ok")]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    client
        .execute(
            Method::GET,
            "/private",
            RequestOptions::new().with_header(
                http::header::AUTHORIZATION,
                "Bearer secret-token-12345".parse().expect("valid header"),
            ),
        )
        .await
        .expect("request succeeds");

    let output = capture.contents();
    assert!(output.contains("request started"));
    assert!(!output.contains("secret-token-12345"));
    assert!(!output.contains("ecret-token-12345"));
    assert!(
        output.contains("***REDACTED***") || output.contains("****") || output.contains("..."),
        "some mask style must appear in: {output}"
    );
}

#[tokio::test]
async fn timeouts_are_retried_then_surface() {
    let transport = FakeTransport::new([Scripted::Timeout, Scripted::Timeout, Scripted::Timeout]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let error = client
        .execute(Method::GET, "/slow", RequestOptions::new())
        .await
        .expect_err("timeouts exhaust");

    match &error {
        Error::Timeout { url, method, .. } => {
            assert_eq!(url, "https://api.test/slow");
            assert_eq!(*method, Method::GET);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }

    assert_eq!(transport.calls(), 3);
    // Every timed-out attempt counts against the breaker.
    assert_eq!(client.breaker().metrics().failed_calls, 3);
    assert_eq!(
        control.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(client.stats().failed_requests, 3);
}

#[tokio::test]
async fn timeout_not_retried_when_disabled() {
    let transport = FakeTransport::new([Scripted::Timeout]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(
        &transport,
        &control,
        no_jitter_policy(3).with_retry_on_timeout(false),
    );

    let error = client
        .execute(Method::GET, "/slow", RequestOptions::new())
        .await
        .expect_err("timeout is terminal");
    assert!(matches!(error, Error::Timeout { .. }));
    assert_eq!(transport.calls(), 1);
    assert!(control.sleeps().is_empty());
}

#[tokio::test]
async fn non_idempotent_method_is_not_retried_on_server_error() {
    let transport = FakeTransport::new([Scripted::Status(503, vec![], "unavailable")]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let error = client
        .execute(Method::POST, "/orders", RequestOptions::new())
        .await
        .expect_err("ambiguous side effects are not retried");

    match &error {
        Error::Server {
            status, attempts, ..
        } => {
            assert_eq!(*status, 503);
            assert_eq!(*attempts, 1);
        }
        other => panic!("expected Server, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1);
    assert!(control.sleeps().is_empty());
}

#[tokio::test]
async fn non_idempotent_method_still_retries_rate_limits() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![], ""),
        Scripted::Status(201, vec![], "created"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let response = client
        .execute(Method::POST, "/orders", RequestOptions::new())
        .await
        .expect("a 429 guarantees no side effect, so POST retries");

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn idempotent_server_errors_retry_until_success() {
    let transport = FakeTransport::new([
        Scripted::Status(503, vec![], ""),
        Scripted::Status(503, vec![], ""),
        Scripted::Status(200, vec![], "recovered"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let response = client
        .execute(Method::GET, "/flaky", RequestOptions::new())
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.text(), "recovered");
    assert_eq!(transport.calls(), 3);
    assert_eq!(
        control.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn auth_failures_are_immediately_terminal() {
    for (code, body) in [(401u16, "who are you"), (403, "not yours"), (404, "nothing here")] {
        let transport = FakeTransport::new([Scripted::Status(code, vec![], body)]);
        let control = ClockControl::new().auto_advance(true);
        let client = client(&transport, &control, no_jitter_policy(3));

        let error = client
            .execute(Method::GET, "/protected", RequestOptions::new())
            .await
            .expect_err("terminal status");

        assert_eq!(error.status(), Some(code));
        assert_eq!(transport.calls(), 1);
        assert!(control.sleeps().is_empty());
        assert_eq!(client.breaker().metrics().failed_calls, 1);
    }
}

#[tokio::test]
async fn unclassified_transport_failure_wraps_as_request_error() {
    let transport = FakeTransport::new([Scripted::Other]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    let error = client
        .execute(Method::GET, "/odd", RequestOptions::new())
        .await
        .expect_err("unclassified failures are terminal");
    assert!(matches!(error, Error::Request { .. }));
    assert_eq!(transport.calls(), 1);
}

struct FailBefore;

impl Middleware for FailBefore {
    fn before(&self, request: &mut armature::RequestContext) -> Result<(), Error> {
        Err(Error::Request {
            url: request.url().to_owned(),
            method: request.method().clone(),
            message: "rejected by middleware".to_owned(),
            source: None,
        })
    }

    fn after(
        &self,
        _request: &armature::RequestContext,
        _response: &mut armature::ResponseContext,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::test]
async fn failing_pre_phase_aborts_before_any_attempt() {
    let transport = FakeTransport::new([]);
    let control = ClockControl::new().auto_advance(true);
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3))
        .middleware(MiddlewareChain::new().with(FailBefore))
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    let error = client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect_err("pre-phase failure aborts");
    assert!(matches!(error, Error::Request { .. }));
    assert_eq!(transport.calls(), 0);
    assert_eq!(client.stats().total_requests, 0);
}

struct FailAfter;

impl Middleware for FailAfter {
    fn before(&self, _request: &mut armature::RequestContext) -> Result<(), Error> {
        Ok(())
    }

    fn after(
        &self,
        request: &armature::RequestContext,
        _response: &mut armature::ResponseContext,
    ) -> Result<(), Error> {
        Err(Error::Request {
            url: request.url().to_owned(),
            method: request.method().clone(),
            message: "rejected in post-phase".to_owned(),
            source: None,
        })
    }
}

#[tokio::test]
async fn failing_post_phase_keeps_breaker_success() {
    let transport = FakeTransport::new([Scripted::Status(200, vec![], "ok")]);
    let control = ClockControl::new().auto_advance(true);
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3))
        .middleware(MiddlewareChain::new().with(FailAfter))
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    let error = client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect_err("post-phase failure aborts");
    assert!(matches!(error, Error::Request { .. }));

    // The response was already recorded on the breaker; the success stands.
    assert_eq!(client.breaker().metrics().successful_calls, 1);
    assert_eq!(client.stats().successful_requests, 1);
}

#[tokio::test]
async fn default_chain_sets_user_agent_and_content_type() {
    let transport = FakeTransport::new([Scripted::Status(200, vec![], "ok")]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    client
        .execute(
            Method::POST,
            "/u",
            RequestOptions::new().with_json(serde_json::json!({"a": 1})),
        )
        .await
        .expect("request succeeds");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert!(
        headers
            .get(http::header::USER_AGENT)
            .expect("user agent set")
            .to_str()
            .expect("ascii")
            .starts_with("armature/")
    );
    assert_eq!(
        headers.get(http::header::CONTENT_TYPE).expect("content type set"),
        "application/json"
    );
}

#[tokio::test]
async fn reset_stats_is_idempotent() {
    let transport = FakeTransport::new([Scripted::Status(200, vec![], "ok")]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect("request succeeds");
    assert_ne!(client.stats(), armature::ClientStats::default());

    client.reset_stats();
    assert_eq!(client.stats(), armature::ClientStats::default());
    client.reset_stats();
    assert_eq!(client.stats(), armature::ClientStats::default());
}

#[tokio::test]
async fn retry_summary_reflects_counters() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![], ""),
        Scripted::Status(200, vec![], "ok"),
    ]);
    let control = ClockControl::new().auto_advance(true);
    let client = client(&transport, &control, no_jitter_policy(3));

    client
        .execute(Method::GET, "/limited", RequestOptions::new())
        .await
        .expect("second attempt succeeds");

    let summary = client.retry_summary();
    assert_eq!(summary.total_requests, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.total_retries, 1);
    assert!((summary.avg_retries - 0.5).abs() < f64::EPSILON);

    let aggregate = client.retry_stats();
    assert_eq!(aggregate.total_attempts(), 2);
    assert_eq!(aggregate.successful_attempts(), 1);
    assert_eq!(aggregate.failed_attempts(), 1);
    assert_eq!(aggregate.total_delay(), Duration::from_secs(1));
    assert_eq!(aggregate.terminal_statuses().get(&200), Some(&1));
}

#[tokio::test]
async fn cancelling_during_backoff_leaves_counters_consistent() {
    let transport = FakeTransport::new([
        Scripted::Status(429, vec![], ""),
        Scripted::Status(200, vec![], "never reached"),
    ]);
    // Without auto-advance the backoff sleep never completes, pinning the call at its
    // suspension point.
    let control = ClockControl::new();
    let client = client(&transport, &control, no_jitter_policy(3));

    let task = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .execute(Method::GET, "/limited", RequestOptions::new())
                .await
        }
    });

    // Let the task run up to the pending sleep, then cancel it mid-backoff.
    for _ in 0..32 {
        if !control.sleeps().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(control.sleeps(), vec![Duration::from_secs(1)]);

    task.abort();
    assert!(task.await.expect_err("task was aborted").is_cancelled());

    // The cancelled sleep is not a breaker failure, and the counters recorded before the
    // suspension point remain consistent.
    assert_eq!(client.breaker().metrics().failed_calls, 0);
    let stats = client.stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.total_retries, 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn breaker_recovers_through_half_open_probe() {
    let transport = FakeTransport::new([Scripted::Connect, Scripted::Status(200, vec![], "ok")]);
    let control = ClockControl::new().auto_advance(true);
    let client = Client::builder("https://api.test")
        .retry_policy(no_jitter_policy(3).with_retry_on_connection_error(false))
        .breaker(
            BreakerConfig::new()
                .with_failure_threshold(1)
                .with_success_threshold(1)
                .with_recovery_timeout(Duration::from_secs(60)),
        )
        .transport(Arc::clone(&transport) as Arc<dyn armature::transport::Transport>)
        .clock(control.to_clock())
        .build()
        .expect("configuration is valid");

    let error = client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect_err("connection fails");
    assert!(matches!(error, Error::Connection { .. }));
    assert_eq!(client.breaker().state(), armature::CircuitState::Open);

    // Before the recovery timeout the circuit rejects outright.
    let error = client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect_err("circuit open");
    assert!(matches!(error, Error::CircuitOpen { .. }));

    // After the timeout a probe is allowed through and heals the circuit.
    control.advance(Duration::from_secs(60));
    let response = client
        .execute(Method::GET, "/u", RequestOptions::new())
        .await
        .expect("probe succeeds");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(client.breaker().state(), armature::CircuitState::Closed);
}

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use volley::http::SendResult;
use volley::{
    BatchFetcher, FailureKind, FetchResult, FetcherConfig, HttpClient, HttpResponse,
    MockHttpClient, RequestDescriptor, VolleyError,
};

fn descriptor(target: &str) -> RequestDescriptor {
    RequestDescriptor::new(target).expect("valid descriptor")
}

fn ok_response(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// The worked example: A succeeds with (200, "hello"), B times out. The
/// result order matches the input order regardless of which settles first.
#[test_log::test(tokio::test)]
async fn test_success_and_timeout_preserve_input_order() {
    let mock = MockHttpClient::new();
    mock.add_response("https://a.example.com", Ok(ok_response("hello")));
    // B hangs (trigger never fired) until its timeout converts it.
    let _trigger = mock.add_response_with_trigger("https://b.example.com", Ok(ok_response("late")));

    let fetcher = BatchFetcher::with_client(mock, FetcherConfig::default());
    let results = fetcher
        .fetch_all(vec![
            descriptor("https://a.example.com"),
            descriptor("https://b.example.com").with_timeout(Duration::from_millis(100)),
        ])
        .await
        .expect("batch should settle");

    assert_eq!(
        results,
        vec![
            FetchResult::Success {
                target: "https://a.example.com".to_string(),
                status: 200,
                preview: "hello".to_string(),
            },
            FetchResult::Failure {
                target: "https://b.example.com".to_string(),
                kind: FailureKind::Timeout,
            },
        ]
    );
}

/// Output order equals input order even when completion order is reversed:
/// the first descriptor is held in flight until the second has finished.
#[test_log::test(tokio::test)]
async fn test_order_preserved_when_completion_order_reversed() {
    let mock = MockHttpClient::new();
    let trigger_a = mock.add_response_with_trigger("https://a.example.com", Ok(ok_response("a")));
    mock.add_response("https://b.example.com", Ok(ok_response("b")));

    let fetcher = std::sync::Arc::new(BatchFetcher::with_client(
        mock.clone(),
        FetcherConfig::default(),
    ));
    let handle = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            fetcher
                .fetch_all(vec![
                    descriptor("https://a.example.com"),
                    descriptor("https://b.example.com"),
                ])
                .await
        })
    };

    // B completes immediately; A is still blocked. The batch must not
    // return until A settles too (join semantics, not a race).
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(mock.in_flight_count(), 1);

    trigger_a.send(()).expect("request A should be waiting");

    let results = handle.await.expect("task").expect("batch");
    let targets: Vec<&str> = results.iter().map(FetchResult::target).collect();
    assert_eq!(targets, vec!["https://a.example.com", "https://b.example.com"]);
    assert!(results.iter().all(FetchResult::is_success));
}

/// A failing request must not delay or affect a sibling's success.
#[test_log::test(tokio::test)]
async fn test_failure_is_isolated_from_siblings() {
    let mock = MockHttpClient::new();
    mock.add_response(
        "https://down.example.com",
        Err(FailureKind::Connect {
            error: "connection reset".to_string(),
        }),
    );
    // A hangs past the failing sibling's settlement, then succeeds.
    let trigger = mock.add_response_with_trigger("https://up.example.com", Ok(ok_response("up")));

    let fetcher = std::sync::Arc::new(BatchFetcher::with_client(
        mock.clone(),
        FetcherConfig::default(),
    ));
    let handle = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            fetcher
                .fetch_all(vec![
                    descriptor("https://up.example.com"),
                    descriptor("https://down.example.com"),
                ])
                .await
        })
    };

    // The sibling has already failed by now; the held request must still be
    // in flight, unaffected.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.in_flight_count(), 1);
    trigger.send(()).expect("request should be waiting");

    let results = handle.await.expect("task").expect("batch");
    assert_eq!(results.len(), 2);
    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert!(
        results[1]
            .error_description()
            .expect("failure description")
            .contains("connection reset")
    );
}

/// Client that panics for one specific target and delegates everything else.
#[derive(Clone)]
struct CrashingClient {
    inner: MockHttpClient,
    crash_target: String,
}

#[async_trait::async_trait]
impl HttpClient for CrashingClient {
    async fn send(&self, target: &str, timeout: Duration) -> SendResult {
        if target == self.crash_target {
            panic!("client crashed for {}", target);
        }
        self.inner.send(target, timeout).await
    }
}

/// A panicking fetch task must not lose its result slot: the batch still
/// settles with one result per descriptor, and the crashed slot is
/// classified `TaskTerminated` while siblings are unaffected.
#[test_log::test(tokio::test)]
async fn test_panicking_task_backfills_slot_as_terminated() {
    let mock = MockHttpClient::new();
    mock.add_response("https://a.example.com", Ok(ok_response("a")));
    mock.add_response("https://c.example.com", Ok(ok_response("c")));

    let client = CrashingClient {
        inner: mock,
        crash_target: "https://b.example.com".to_string(),
    };

    let fetcher = BatchFetcher::with_client(client, FetcherConfig::default());
    let results = fetcher
        .fetch_all(vec![
            descriptor("https://a.example.com"),
            descriptor("https://b.example.com"),
            descriptor("https://c.example.com"),
        ])
        .await
        .expect("batch should settle despite the panic");

    assert_eq!(
        results,
        vec![
            FetchResult::Success {
                target: "https://a.example.com".to_string(),
                status: 200,
                preview: "a".to_string(),
            },
            FetchResult::Failure {
                target: "https://b.example.com".to_string(),
                kind: FailureKind::TaskTerminated,
            },
            FetchResult::Success {
                target: "https://c.example.com".to_string(),
                status: 200,
                preview: "c".to_string(),
            },
        ]
    );
}

/// With max_concurrency = 2 and 6 descriptors, the observed in-flight count
/// never exceeds 2, and every descriptor still settles successfully.
#[test_log::test(tokio::test)]
async fn test_concurrency_cap_is_never_exceeded() {
    let mock = MockHttpClient::new();
    let targets: Vec<String> = (0..6)
        .map(|i| format!("https://t{}.example.com", i))
        .collect();

    let mut triggers = Vec::new();
    for target in &targets {
        triggers.push(mock.add_response_with_trigger(target, Ok(ok_response("ok"))));
    }

    let config = FetcherConfig {
        max_concurrency: Some(2),
        ..FetcherConfig::default()
    };
    let fetcher = std::sync::Arc::new(BatchFetcher::with_client(mock.clone(), config));
    let handle = {
        let fetcher = fetcher.clone();
        let descriptors = targets.iter().map(|t| descriptor(t)).collect();
        tokio::spawn(async move { fetcher.fetch_all(descriptors).await })
    };

    // Only two requests may be admitted while all responses are held.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.in_flight_count(), 2);

    // Release everything; queued descriptors are admitted as slots free up.
    for trigger in triggers {
        let _ = trigger.send(());
    }

    let results = handle.await.expect("task").expect("batch");
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(FetchResult::is_success));
    let result_targets: Vec<&str> = results.iter().map(FetchResult::target).collect();
    assert_eq!(result_targets, targets);
    assert!(mock.max_in_flight_count() <= 2);
}

/// Cancellation aborts in-flight requests and fails the whole batch rather
/// than returning partial results.
#[test_log::test(tokio::test)]
async fn test_cancellation_aborts_batch_without_partial_results() {
    let mock = MockHttpClient::new();
    mock.add_response("https://fast.example.com", Ok(ok_response("done")));
    let _trigger =
        mock.add_response_with_trigger("https://slow.example.com", Ok(ok_response("never")));

    let fetcher = BatchFetcher::with_client(mock.clone(), FetcherConfig::default());
    let cancel = CancellationToken::new();

    let batch = fetcher.fetch_all_with_cancellation(
        vec![
            descriptor("https://fast.example.com"),
            descriptor("https://slow.example.com"),
        ],
        cancel.clone(),
    );
    tokio::pin!(batch);

    // Let the fast request finish and the slow one park, then cancel.
    tokio::select! {
        _ = &mut batch => panic!("batch should still be waiting on the slow request"),
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }
    cancel.cancel();

    let error = batch.await.expect_err("cancelled batch must not return results");
    assert!(matches!(error, VolleyError::Cancelled));

    // The aborted request's client future is dropped.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.in_flight_count(), 0);
}

/// Calling fetch_all twice with the same descriptors and a deterministic
/// client produces structurally equivalent results.
#[test_log::test(tokio::test)]
async fn test_repeat_batches_are_structurally_equivalent() {
    let mock = MockHttpClient::new();
    for _ in 0..2 {
        mock.add_response("https://a.example.com", Ok(ok_response("hello")));
        mock.add_response("https://b.example.com", Err(FailureKind::Timeout));
    }

    let fetcher = BatchFetcher::with_client(mock, FetcherConfig::default());
    let descriptors = vec![
        descriptor("https://a.example.com"),
        descriptor("https://b.example.com"),
    ];

    let first = fetcher.fetch_all(descriptors.clone()).await.expect("batch");
    let second = fetcher.fetch_all(descriptors).await.expect("batch");
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_value(&first).expect("serializable"),
        serde_json::to_value(&second).expect("serializable"),
    );
}

/// Bigger batch: every descriptor gets exactly one result, in order, with
/// successes and failures interleaved.
#[test_log::test(tokio::test)]
async fn test_mixed_batch_length_and_order_invariant() {
    let mock = MockHttpClient::new();
    let mut descriptors = Vec::new();
    for i in 0..20 {
        let target = format!("https://t{}.example.com", i);
        if i % 3 == 0 {
            mock.add_response(
                &target,
                Err(FailureKind::Connect {
                    error: "refused".to_string(),
                }),
            );
        } else {
            mock.add_response(&target, Ok(ok_response(&format!("body-{}", i))));
        }
        descriptors.push(descriptor(&target));
    }

    let fetcher = BatchFetcher::with_client(mock, FetcherConfig::default());
    let results = fetcher.fetch_all(descriptors.clone()).await.expect("batch");

    assert_eq!(results.len(), descriptors.len());
    for (i, (result, descriptor)) in results.iter().zip(&descriptors).enumerate() {
        assert_eq!(result.target(), descriptor.target);
        assert_eq!(result.is_success(), i % 3 != 0);
    }
}

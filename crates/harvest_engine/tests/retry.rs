mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{query, RecordingSleeper, ScriptedFetcher};
use harvest_engine::{FailureKind, PageError, RetryPolicy};
use tokio_util::sync::CancellationToken;

fn policy(max_attempts: u32, sleeper: &Arc<RecordingSleeper>) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(350)).with_sleeper(sleeper.clone())
}

#[tokio::test]
async fn succeeds_after_transient_failures_with_linear_backoff() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = ScriptedFetcher::new(450).fail(200, 2);

    let page = policy(3, &sleeper)
        .fetch_with_retry(&fetcher, &query(), 200, 200, &CancellationToken::new())
        .await
        .expect("third attempt succeeds");

    assert_eq!(page.offset, 200);
    assert_eq!(page.records.len(), 200);
    assert_eq!(fetcher.calls_for(200), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(350), Duration::from_millis(700)]
    );
}

#[tokio::test]
async fn exhaustion_returns_last_error_and_attempt_count() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = ScriptedFetcher::new(450).fail(400, u32::MAX);

    let err = policy(3, &sleeper)
        .fetch_with_retry(&fetcher, &query(), 400, 200, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 3);
    assert_eq!(err.last.offset, 400);
    assert_eq!(err.last.kind, FailureKind::HttpStatus(503));
    assert_eq!(fetcher.calls_for(400), 3);
    // No sleep after the final attempt.
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn single_attempt_budget_never_sleeps() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = ScriptedFetcher::new(10).fail(0, 1);

    let err = policy(1, &sleeper)
        .fetch_with_retry(&fetcher, &query(), 0, 200, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn zero_attempts_is_treated_as_one() {
    let policy = RetryPolicy::new(0, Duration::from_millis(1));
    assert_eq!(policy.max_attempts(), 1);
    assert_eq!(policy.backoff(4), Duration::from_millis(4));
}

#[tokio::test]
async fn cancelled_token_stops_further_attempts() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut attempts = 0;
    let err = policy(3, &sleeper)
        .run(&cancel, |attempt| {
            attempts = attempt;
            async move {
                Err::<(), _>(PageError {
                    kind: FailureKind::Timeout,
                    offset: 600,
                    message: "timed out".into(),
                })
            }
        })
        .await
        .unwrap_err();

    assert_eq!(attempts, 1);
    assert_eq!(err.attempts, 1);
    assert_eq!(err.last.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn every_failure_kind_is_retried() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let kinds = [
        FailureKind::Transport,
        FailureKind::Timeout,
        FailureKind::HttpStatus(500),
        FailureKind::MalformedResponse,
    ];

    for kind in kinds {
        let mut calls = 0;
        let result = policy(2, &sleeper)
            .run(&CancellationToken::new(), |attempt| {
                calls += 1;
                let kind = kind.clone();
                async move {
                    if attempt == 1 {
                        Err(PageError {
                            kind,
                            offset: 0,
                            message: String::new(),
                        })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls, 2);
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dataset_push_core::bulk::BulkTransferUploader;
use dataset_push_core::contract::{
    ApiResponse, MockContentsApi, MockProcessRunner, MockUploader, ProcessOutput,
};
use dataset_push_core::direct::DirectUploader;
use dataset_push_core::{
    run_batch, BatchOptions, RepositoryConfig, RepositoryUploader, UploadCandidate, UploadError,
    UploadMethod, Uploader,
};
use tokio_util::sync::CancellationToken;

const MB: usize = 1024 * 1024;

fn config() -> RepositoryConfig {
    RepositoryConfig {
        token: "ghp_test".into(),
        owner: "acme".into(),
        repo: "datasets".into(),
        branch: "main".into(),
        upload_path_prefix: "data/".into(),
        commit_message_template: "Add dataset: {filename} - {timestamp}".into(),
    }
}

#[tokio::test]
async fn mixed_batch_routes_by_size_and_succeeds() {
    let mut uploader = MockUploader::new();
    uploader
        .expect_check_bulk_capability()
        .times(1)
        .returning(|| Ok(()));
    uploader
        .expect_upload_direct()
        .withf(|_, candidate, _| candidate.name == "a.csv")
        .times(1)
        .returning(|_, _, _| Ok(()));
    uploader
        .expect_upload_bulk()
        .withf(|_, candidate, _| candidate.name == "b.pdf")
        .times(1)
        .returning(|_, _, _| Ok(()));

    let candidates = vec![
        UploadCandidate::new("a.csv", vec![b'x'; 1024]),
        UploadCandidate::new("b.pdf", vec![0u8; 30 * MB]),
    ];

    let summary = run_batch(
        &config(),
        &candidates,
        &uploader,
        &BatchOptions::default(),
        |_| {},
    )
    .await
    .expect("batch should run");

    assert_eq!(summary.outcomes[0].method, UploadMethod::Direct);
    assert_eq!(summary.outcomes[1].method, UploadMethod::BulkTransfer);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 0);
    assert_eq!(summary.total_count, 2);
}

#[tokio::test]
async fn incomplete_config_aborts_with_zero_outcomes() {
    let mut uploader = MockUploader::new();
    uploader.expect_check_bulk_capability().times(0);
    uploader.expect_upload_direct().times(0);
    uploader.expect_upload_bulk().times(0);

    let mut cfg = config();
    cfg.token.clear();
    let candidates = vec![UploadCandidate::new("a.csv", vec![1, 2, 3])];
    let mut progress_calls = 0;

    let err = run_batch(&cfg, &candidates, &uploader, &BatchOptions::default(), |_| {
        progress_calls += 1
    })
    .await
    .unwrap_err();

    assert!(matches!(err, UploadError::ConfigIncomplete { ref missing } if missing == &vec!["token"]));
    assert_eq!(progress_calls, 0);
}

#[tokio::test]
async fn missing_lfs_aborts_before_any_upload() {
    let mut uploader = MockUploader::new();
    uploader
        .expect_check_bulk_capability()
        .times(1)
        .returning(|| Err(UploadError::MissingCapability("git-lfs not installed".into())));
    uploader.expect_upload_direct().times(0);
    uploader.expect_upload_bulk().times(0);

    let candidates = vec![
        UploadCandidate::new("small.csv", vec![0u8; 10]),
        UploadCandidate::new("big.xlsx", vec![0u8; 26 * MB]),
    ];
    let err = run_batch(
        &config(),
        &candidates,
        &uploader,
        &BatchOptions::default(),
        |_| {},
    )
    .await
    .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, UploadError::MissingCapability(_)));
}

#[tokio::test]
async fn failures_are_isolated_and_counted() {
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload_direct()
        .times(3)
        .returning(|_, candidate, _| {
            if candidate.name == "bad.json" {
                Err(UploadError::ApiFailure {
                    status_code: 422,
                    body: "Invalid request".into(),
                })
            } else {
                Ok(())
            }
        });

    let candidates = vec![
        UploadCandidate::new("one.csv", vec![1]),
        UploadCandidate::new("bad.json", vec![2]),
        UploadCandidate::new("three.txt", vec![3]),
    ];
    let summary = run_batch(
        &config(),
        &candidates,
        &uploader,
        &BatchOptions::default(),
        |_| {},
    )
    .await
    .unwrap();

    let names: Vec<&str> = summary
        .outcomes
        .iter()
        .map(|o| o.candidate_name.as_str())
        .collect();
    assert_eq!(names, vec!["one.csv", "bad.json", "three.txt"]);
    assert!(summary.outcomes[0].succeeded);
    assert!(!summary.outcomes[1].succeeded);
    assert!(summary.outcomes[1]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("422"));
    assert!(summary.outcomes[2].succeeded);
    assert_eq!(
        summary.success_count + summary.failure_count,
        summary.total_count
    );
}

/// Drives the real direct uploader against a mocked contents API that keeps
/// answering 409 for the first file.
#[tokio::test]
async fn stale_sha_conflict_fails_one_candidate_only() {
    let mut api = MockContentsApi::new();
    api.expect_get_content().returning(|_, path| {
        if path == "data/existing.csv" {
            Ok(ApiResponse {
                status: 200,
                body: r#"{"sha":"stale"}"#.into(),
            })
        } else {
            Ok(ApiResponse {
                status: 404,
                body: r#"{"message":"Not Found"}"#.into(),
            })
        }
    });
    api.expect_put_content().returning(|_, path, _| {
        let status = if path == "data/existing.csv" { 409 } else { 201 };
        Ok(ApiResponse {
            status,
            body: String::new(),
        })
    });

    let uploader = RepositoryUploader::new(
        DirectUploader::new(api),
        BulkTransferUploader::new(MockProcessRunner::new()),
    );
    let candidates = vec![
        UploadCandidate::new("existing.csv", vec![1]),
        UploadCandidate::new("fresh.csv", vec![2]),
    ];
    let summary = run_batch(
        &config(),
        &candidates,
        &uploader,
        &BatchOptions::default(),
        |_| {},
    )
    .await
    .unwrap();

    assert!(!summary.outcomes[0].succeeded);
    assert!(summary.outcomes[0]
        .error_detail
        .as_deref()
        .unwrap()
        .to_lowercase()
        .contains("conflict"));
    assert!(summary.outcomes[1].succeeded);
    assert_eq!(summary.failure_count, 1);
}

#[tokio::test]
async fn real_uploader_runs_git_for_large_files() {
    let mut runner = MockProcessRunner::new();
    runner.expect_run().returning(|_| {
        Ok(ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        })
    });
    let mut api = MockContentsApi::new();
    api.expect_get_content().times(0);
    api.expect_put_content().times(0);

    let uploader = RepositoryUploader::new(DirectUploader::new(api), BulkTransferUploader::new(runner));
    let options = BatchOptions {
        threshold_bytes: 4,
        ..BatchOptions::default()
    };
    let candidates = vec![UploadCandidate::new("big.csv", vec![0u8; 8])];
    let summary = run_batch(&config(), &candidates, &uploader, &options, |_| {})
        .await
        .unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.outcomes[0].method, UploadMethod::BulkTransfer);
}

/// Test double whose uploads take longer the earlier they were submitted, and
/// which records how many bulk transfers overlap.
struct SlowUploader {
    bulk_in_flight: AtomicUsize,
    bulk_peak: AtomicUsize,
}

impl SlowUploader {
    fn new() -> Self {
        Self {
            bulk_in_flight: AtomicUsize::new(0),
            bulk_peak: AtomicUsize::new(0),
        }
    }
}

fn delay_for(candidate: &UploadCandidate) -> Duration {
    let index: u64 = candidate
        .name
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .split('.')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    Duration::from_millis(60 - index * 10)
}

#[async_trait]
impl Uploader for SlowUploader {
    async fn check_bulk_capability(&self) -> Result<(), UploadError> {
        Ok(())
    }

    async fn upload_direct(
        &self,
        _config: &RepositoryConfig,
        candidate: &UploadCandidate,
        _cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        tokio::time::sleep(delay_for(candidate)).await;
        Ok(())
    }

    async fn upload_bulk(
        &self,
        _config: &RepositoryConfig,
        candidate: &UploadCandidate,
        _cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let now = self.bulk_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.bulk_peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay_for(candidate)).await;
        self.bulk_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn concurrent_batch_keeps_submission_order_and_bounds_bulk() {
    let uploader = Arc::new(SlowUploader::new());
    let candidates: Vec<UploadCandidate> = (0..5)
        .map(|i| {
            let size = if i % 2 == 0 { 16 } else { 1 };
            UploadCandidate::new(format!("file{i}.csv"), vec![0u8; size])
        })
        .collect();
    let options = BatchOptions {
        threshold_bytes: 8,
        max_concurrent_uploads: 5,
        max_concurrent_bulk_transfers: 1,
        ..BatchOptions::default()
    };

    let mut completed = Vec::new();
    let summary = run_batch(&config(), &candidates, uploader.as_ref(), &options, |p| {
        completed.push(p.completed)
    })
    .await
    .unwrap();

    let names: Vec<String> = summary
        .outcomes
        .iter()
        .map(|o| o.candidate_name.clone())
        .collect();
    let expected: Vec<String> = (0..5).map(|i| format!("file{i}.csv")).collect();
    assert_eq!(names, expected);
    assert_eq!(completed, vec![1, 2, 3, 4, 5]);
    assert_eq!(uploader.bulk_peak.load(Ordering::SeqCst), 1);
    assert_eq!(summary.success_count, 5);
}

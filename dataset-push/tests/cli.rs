use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::TempDir;

fn dataset_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path().join("a.csv"), b"id,value\n1,2\n").unwrap();
    write(dir.path().join("b.pdf"), vec![0u8; 2 * 1024 * 1024]).unwrap();
    dir
}

fn config_with_threshold_mb(dir: &TempDir, mb: u64) -> std::path::PathBuf {
    let path = dir.path().join("dataset-push.yaml");
    write(&path, format!("upload:\n  threshold_mb: {mb}\n")).unwrap();
    path
}

#[test]
fn plan_prints_method_per_file() {
    let dir = dataset_dir();
    let config = config_with_threshold_mb(&dir, 1);

    Command::cargo_bin("dataset-push")
        .expect("binary exists")
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .arg(dir.path().join("a.csv"))
        .arg(dir.path().join("b.pdf"))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("a.csv")
                .and(predicate::str::contains("Direct Upload"))
                .and(predicate::str::contains("b.pdf"))
                .and(predicate::str::contains("Git LFS"))
                .and(predicate::str::contains("Files: 2")),
        );
}

#[test]
fn upload_without_token_fails_before_uploading() {
    let dir = dataset_dir();

    Command::cargo_bin("dataset-push")
        .expect("binary exists")
        .current_dir(dir.path())
        .arg("upload")
        .arg("--owner")
        .arg("acme")
        .arg("--repo")
        .arg("datasets")
        .arg(dir.path().join("a.csv"))
        .env_remove("GITHUB_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing token"))
        .stdout(predicate::str::contains("[1/1]").not());
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = dataset_dir();
    let exe = dir.path().join("tool.exe");
    write(&exe, b"MZ").unwrap();

    Command::cargo_bin("dataset-push")
        .expect("binary exists")
        .arg("plan")
        .arg(&exe)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type"));
}

#[test]
fn upload_requires_files() {
    Command::cargo_bin("dataset-push")
        .expect("binary exists")
        .arg("upload")
        .assert()
        .failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Collects the debug rendering of every emitted event.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use dataset_push::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Plan {
            config: Some(std::path::PathBuf::from("dummy.yaml")),
            files: vec![std::path::PathBuf::from("a.csv")],
        },
    };
    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

use serde_json::{Value, json};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG_ENV_KEYS: [&str; 6] = [
    "HOOKCHAT_WEBHOOK_URL",
    "HOOKCHAT_MAX_RETRIES",
    "HOOKCHAT_RETRY_DELAY_MS",
    "HOOKCHAT_REQUEST_TIMEOUT_MS",
    "HOOKCHAT_MESSAGE_FIELD",
    "HOOKCHAT_VERBOSE",
];

fn run_cli(args: &[&str], cwd: &Path) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hookchat-cli"));
    for key in CONFIG_ENV_KEYS {
        command.env_remove(key);
    }
    command
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("cli command should execute")
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

async fn hook_server(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_command_success_expected_reply_text_and_log_file() {
    let server = hook_server(
        200,
        json!({"text": "Hi there", "image": "https://img.example.test/cat.png"}),
    )
    .await;
    let temp = TempDir::new().expect("temp dir should create");
    let url = format!("{}/hook", server.uri());

    let output = run_cli(
        &["send", "Hello", "--webhook-url", &url, "--session", "sess-1"],
        temp.path(),
    );
    assert_exit(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Hi there"));
    assert!(stdout.contains("image: https://img.example.test/cat.png"));
    assert!(temp.path().join("logs").join("hookchat.log").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_command_json_expected_outcome_document() {
    let server = hook_server(200, json!({"message": "json reply"})).await;
    let temp = TempDir::new().expect("temp dir should create");
    let url = format!("{}/hook", server.uri());

    let output = run_cli(
        &[
            "send",
            "Hello",
            "--webhook-url",
            &url,
            "--session",
            "sess-1",
            "--json",
            "--no-log-file",
        ],
        temp.path(),
    );
    assert_exit(&output, 0);

    let reply: Value = serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(reply["outcome"]["success"], true);
    assert_eq!(reply["display"]["text"], "json reply");
    assert!(reply["outcome"].get("error").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_command_server_error_expected_exit_two_with_friendly_message() {
    let server = hook_server(503, json!({"error": "maintenance"})).await;
    let temp = TempDir::new().expect("temp dir should create");
    let url = format!("{}/hook", server.uri());

    let output = run_cli(
        &[
            "send",
            "Hello",
            "--webhook-url",
            &url,
            "--session",
            "sess-1",
            "--max-retries",
            "1",
            "--retry-delay-ms",
            "5",
        ],
        temp.path(),
    );
    assert_exit(&output, 2);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Trying again"));
    assert!(stderr.contains("The server is having trouble right now"));
}

#[test]
fn send_command_without_webhook_url_expected_config_error() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = run_cli(&["send", "Hello", "--no-log-file"], temp.path());
    assert_exit(&output, 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("webhook url is not set"));
}

#[test]
fn session_command_persists_until_reset() {
    let temp = TempDir::new().expect("temp dir should create");

    let first = run_cli(&["session"], temp.path());
    assert_exit(&first, 0);
    let first_id = String::from_utf8_lossy(&first.stdout).trim().to_string();
    assert!(first_id.starts_with("sess-"));

    let again = run_cli(&["session"], temp.path());
    assert_eq!(String::from_utf8_lossy(&again.stdout).trim(), first_id);

    let reset = run_cli(&["session", "--reset"], temp.path());
    assert_exit(&reset, 0);
    let reset_id = String::from_utf8_lossy(&reset.stdout).trim().to_string();
    assert_ne!(reset_id, first_id);
    assert!(temp.path().join(".hookchat").join("session.json").exists());
}

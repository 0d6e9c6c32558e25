use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde_json::Value;
use tempfile::TempDir;

type Requests = Arc<Mutex<Vec<String>>>;

/// Loopback endpoint answering each connection with the next canned body; records raw queries.
struct Stub {
    url: String,
    requests: Requests,
    handle: JoinHandle<()>,
}

impl Stub {
    fn serve(bodies: Vec<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/exec", listener.local_addr().expect("addr"));
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let bodies: Vec<String> = bodies.into_iter().map(str::to_string).collect();
        let handle = std::thread::spawn(move || {
            for body in bodies {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).expect("read");
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
                let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
                let decoded = urlencoding::decode(&query.replace('+', " "))
                    .expect("utf8")
                    .into_owned();
                recorded.lock().expect("lock").push(decoded);
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).expect("write");
            }
        });
        Stub {
            url,
            requests,
            handle,
        }
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().expect("stub thread");
        let requests = self.requests.lock().expect("lock");
        requests.clone()
    }
}

const LIST: &str = r#"[
    {"Name": "My Project", "Priority": 3, "Status": "In Progress", "Subtasks": "[{\"text\":\"draft\",\"done\":false},{\"text\":\"review\",\"done\":true}]"},
    {"Name": "Launch", "Priority": 5, "Status": "Not Started", "Subtasks": ""},
    {"Name": "Retro", "Priority": 1, "Status": "Complete", "Subtasks": []}
]"#;

fn run(home: &Path, endpoint: Option<&str>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sheetrack"));
    cmd.arg("--root")
        .arg(home)
        .args(args)
        .env("SHEETRACK_HOME", home.join(".global"))
        .env_remove("SHEETRACK_ENDPOINT")
        .env_remove("SHEETRACK_TOKEN")
        .env_remove("SHEETRACK_LOG");
    if let Some(endpoint) = endpoint {
        cmd.env("SHEETRACK_ENDPOINT", endpoint)
            .env("SHEETRACK_TOKEN", "tok");
    }
    cmd.output().expect("run sheetrack")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn list_prints_banner_and_sorted_rows() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(vec![LIST]);
    let output = run(temp.path(), Some(&stub.url), &["list"]);
    assert!(output.status.success(), "{:?}", output);
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "3 projects · 1 complete (33.3%)");
    assert_eq!(lines[1], "3 | Not Started | 5 | Launch | 0/0");
    assert_eq!(lines[2], "2 | In Progress | 3 | My Project | 1/2");
    assert_eq!(lines[3], "4 | Complete | 1 | Retro | 0/0");
    assert_eq!(stub.finish(), vec!["token=tok".to_string()]);
}

#[test]
fn list_filters_keep_stamped_rows() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(vec![LIST]);
    let output = run(
        temp.path(),
        Some(&stub.url),
        &["list", "--search", "PROJ", "--status", "in progress", "--json"],
    );
    assert!(output.status.success(), "{:?}", output);
    let view: Value = serde_json::from_slice(&output.stdout).expect("json");
    let view = view.as_array().expect("array");
    assert_eq!(view.len(), 1);
    assert_eq!(view[0]["name"], "My Project");
    assert_eq!(view[0]["row"], 2);
    assert_eq!(view[0]["status"], "In Progress");
    stub.finish();
}

#[test]
fn subtask_done_persists_whole_list() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(vec![LIST, ""]);
    let output = run(
        temp.path(),
        Some(&stub.url),
        &["subtask", "done", "--row", "2", "--index", "1"],
    );
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(stdout(&output), "1. [x] draft\n2. [x] review\n");

    let requests = stub.finish();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1],
        r#"token=tok&row=2&updateSubtasks=1&subtasks=[{"text":"draft","done":true},{"text":"review","done":true}]"#
    );
}

#[test]
fn delete_targets_row_then_reloads() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(vec![LIST, "", "[]"]);
    let output = run(temp.path(), Some(&stub.url), &["delete", "--row", "3"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(stdout(&output), "0 projects · 0 complete (0.0%)\n");
    let requests = stub.finish();
    assert_eq!(requests[1], "token=tok&row=3&delete=1");
    assert_eq!(requests[2], "token=tok");
}

#[test]
fn invalid_add_is_rejected_before_any_request() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(Vec::new());
    let output = run(
        temp.path(),
        Some(&stub.url),
        &["add", "--name", "X", "--priority", "7", "--status", "Complete"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Priority must be a number between 1 and 5"));
    assert!(stub.finish().is_empty());
}

#[test]
fn clear_requires_confirmation() {
    let temp = TempDir::new().expect("tempdir");
    let output = run(temp.path(), Some("http://127.0.0.1:9/exec"), &["clear"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--yes"));
}

#[test]
fn missing_endpoint_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let output = run(temp.path(), None, &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("SHEETRACK_ENDPOINT"));
}

#[test]
fn config_set_then_show() {
    let temp = TempDir::new().expect("tempdir");
    let set = run(
        temp.path(),
        None,
        &[
            "config",
            "set",
            "--endpoint",
            "https://sheet.test/exec",
            "--token",
            "hidden",
            "--header-rows",
            "2",
        ],
    );
    assert!(set.status.success(), "{:?}", set);
    assert!(temp.path().join(".sheetrack.toml").is_file());

    let show = run(temp.path(), None, &["config", "show"]);
    assert!(show.status.success(), "{:?}", show);
    let text = stdout(&show);
    assert!(text.contains("endpoint: https://sheet.test/exec (project)"));
    assert!(text.contains("token: (set) (project)"));
    assert!(text.contains("header_rows: 2 (project)"));
    assert!(text.contains("timeout_secs: 30 (default)"));
    assert!(!text.contains("hidden"));
}

#[test]
fn status_filter_matches_unknown_labels_case_insensitively() {
    let temp = TempDir::new().expect("tempdir");
    let body = r#"[
        {"Name": "Waiting", "Priority": 2, "Status": "Blocked", "Subtasks": ""},
        {"Name": "Moving", "Priority": 3, "Status": "In Progress", "Subtasks": ""}
    ]"#;
    let stub = Stub::serve(vec![body]);
    let output = run(
        temp.path(),
        Some(&stub.url),
        &["list", "--status", "blocked", "--json"],
    );
    assert!(output.status.success(), "{:?}", output);
    let view: Value = serde_json::from_slice(&output.stdout).expect("json");
    let view = view.as_array().expect("array");
    assert_eq!(view.len(), 1);
    assert_eq!(view[0]["name"], "Waiting");
    assert_eq!(view[0]["status"], "Blocked");
    stub.finish();
}

#[test]
fn misspelled_status_filter_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let stub = Stub::serve(vec![LIST]);
    let output = run(
        temp.path(),
        Some(&stub.url),
        &["list", "--status", "In Progres"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown status filter 'In Progres'"), "{stderr}");
    assert!(stderr.contains("Not Started, In Progress, Complete"), "{stderr}");
    stub.finish();
}

#[test]
fn mistyped_config_is_reported_not_ignored() {
    let temp = TempDir::new().expect("tempdir");
    std::fs::write(
        temp.path().join(".sheetrack.toml"),
        "endpoint = \"https://p.test\"\ntoken = \"t\"\ntimeout_secs = \"30\"\n",
    )
    .expect("project config");

    let list = run(temp.path(), None, &["list"]);
    assert!(!list.status.success());
    let stderr = String::from_utf8_lossy(&list.stderr);
    assert!(stderr.contains("Failed to parse config"), "{stderr}");
    assert!(!stderr.contains("No store endpoint"), "{stderr}");

    let show = run(temp.path(), None, &["config", "show"]);
    assert!(!show.status.success());
    assert!(String::from_utf8_lossy(&show.stderr).contains(".sheetrack.toml"));
}

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradetrackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradetrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradetrack-router-smoke");
    let archive_out = workspace.join("smoke-backup.gtarchive.zip");

    let (mut child, mut stdin, mut reader) = spawn_daemon();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        health
            .get("result")
            .and_then(|v| v.get("version"))
            .and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );

    // Store-backed methods refuse to run before a workspace is chosen.
    let early = request(&mut stdin, &mut reader, "2", "results.semesters", json!({}));
    assert_eq!(
        early
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let upload = request(
        &mut stdin,
        &mut reader,
        "4",
        "records.bulkUpload",
        json!({ "rows": [{
            "Reg_No": "210101120001",
            "Name": "Asha Rao",
            "Sem": "1",
            "Subject_Code": "CUTM1001",
            "Subject_Name": "Data Structures",
            "Credits": "3+1",
            "Grade": "A",
            "Subject_Type": "Theory"
        }] }),
    );
    assert_eq!(
        upload
            .get("result")
            .and_then(|v| v.get("inserted"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );

    let _ = request(&mut stdin, &mut reader, "5", "results.semesters", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "results.search",
        json!({ "registration": "210101120001", "semesters": ["Sem 1"] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "records.view",
        json!({ "registration": "210101120001" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "records.registrations",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "backlog.search",
        json!({ "branch": "CSE" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "records.batch",
        json!({ "branch": "CSE" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "catalogue.list",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "baskets.requirements",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "baskets.track",
        json!({ "registration": "210101120001" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "backup.exportArchive",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "outPath": archive_out.to_string_lossy()
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "backup.importArchive",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "inPath": archive_out.to_string_lossy()
        }),
    );

    // Unknown methods report not_implemented (bypass the helper, which
    // treats that code as a routing bug).
    writeln!(
        stdin,
        "{}",
        json!({ "id": "16", "method": "records.nope", "params": {} })
    )
    .expect("write unknown request");
    stdin.flush().expect("flush unknown request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read unknown response");
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).expect("parse unknown response");
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    // Unparseable lines get a bare bad_json reply with no id.
    writeln!(stdin, "this is not json").expect("write junk");
    stdin.flush().expect("flush junk");
    let mut junk_line = String::new();
    reader.read_line(&mut junk_line).expect("read junk response");
    assert!(junk_line.contains("bad_json"), "got: {}", junk_line);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

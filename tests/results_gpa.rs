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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn error_message(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
}

fn seed_grades(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let rows = json!([
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "1",
          "Subject_Code": "CUTM1001", "Subject_Name": "Data Structures",
          "Credits": "3+1", "Grade": "A" },
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "1",
          "Subject_Code": "CUTM1002", "Subject_Name": "Discrete Mathematics",
          "Credits": "2+2", "Grade": "C" },
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "2",
          "Subject_Code": "CUTM2001", "Subject_Name": "Operating Systems",
          "Credits": "3+1", "Grade": "O" },
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "2",
          "Subject_Code": "CUTM2002", "Subject_Name": "Probability",
          "Credits": "4", "Grade": "D" },
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "3",
          "Subject_Code": "CUTM3001", "Subject_Name": "Seminar",
          "Credits": "2+0", "Grade": "9.5" },
        { "Reg_No": "210101120001", "Name": "Asha Rao", "Sem": "3",
          "Subject_Code": "CUTM3002", "Subject_Name": "Yoga",
          "Credits": "", "Grade": "A" },
        { "Reg_No": "210101120002", "Name": "Rohan Das", "Sem": "1",
          "Subject_Code": "CUTM1001", "Subject_Name": "Data Structures",
          "Credits": "3+0", "Grade": "B" }
    ]);
    let resp = request(
        stdin,
        reader,
        "seed",
        "records.bulkUpload",
        json!({ "rows": rows }),
    );
    assert_eq!(
        resp.get("result")
            .and_then(|v| v.get("inserted"))
            .and_then(|v| v.as_u64()),
        Some(7)
    );
}

#[test]
fn search_reports_per_semester_sgpa_and_overall_cgpa() {
    let workspace = temp_dir("gradetrack-results-gpa");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let _ = request(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_grades(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "s1",
        "results.search",
        json!({
            "registration": "210101120001",
            "semesters": ["Sem 1", "Sem 2", "Sem 3", "Sem 9"]
        }),
    );
    let result = resp.get("result").expect("result");
    assert_eq!(result.get("count").and_then(|v| v.as_u64()), Some(6));

    let blocks = result
        .get("semesters")
        .and_then(|v| v.as_object())
        .expect("semester blocks");
    // Semesters with no rows get no block at all.
    assert!(!blocks.contains_key("Sem 9"));

    let sem1 = blocks.get("Sem 1").expect("Sem 1 block");
    assert_eq!(sem1.get("count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(sem1.get("sgpa").and_then(|v| v.as_f64()), Some(7.0));
    assert_eq!(sem1.get("totalCredits").and_then(|v| v.as_f64()), Some(8.0));

    let sem2 = blocks.get("Sem 2").expect("Sem 2 block");
    assert_eq!(sem2.get("sgpa").and_then(|v| v.as_f64()), Some(7.5));

    // The numeric grade and the credit-less row land in the same block:
    // one row carries its parsed points, the other contributes nothing.
    let sem3 = blocks.get("Sem 3").expect("Sem 3 block");
    assert_eq!(sem3.get("count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(sem3.get("sgpa").and_then(|v| v.as_f64()), Some(9.5));
    assert_eq!(sem3.get("totalCredits").and_then(|v| v.as_f64()), Some(2.0));

    assert_eq!(result.get("cgpa").and_then(|v| v.as_f64()), Some(7.5));
    assert_eq!(
        result
            .get("totalAllSemesterCredits")
            .and_then(|v| v.as_f64()),
        Some(18.0)
    );
    assert!(result.get("message").map(|v| v.is_null()).unwrap_or(false));

    let as_of = result
        .get("asOfDate")
        .and_then(|v| v.as_str())
        .expect("asOfDate");
    assert_eq!(as_of.matches('-').count(), 2, "got: {}", as_of);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn search_by_name_is_case_insensitive_and_skips_cgpa() {
    let workspace = temp_dir("gradetrack-results-name");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let _ = request(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_grades(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "s1",
        "results.search",
        json!({ "name": "rohan das", "semesters": ["Sem 1"] }),
    );
    let result = resp.get("result").expect("result");
    assert_eq!(result.get("count").and_then(|v| v.as_u64()), Some(1));
    let sem1 = result
        .get("semesters")
        .and_then(|v| v.get("Sem 1"))
        .expect("Sem 1 block");
    assert_eq!(sem1.get("sgpa").and_then(|v| v.as_f64()), Some(7.0));
    // Cumulative figures need a registration number to anchor them.
    assert!(result.get("cgpa").map(|v| v.is_null()).unwrap_or(false));
    assert!(result
        .get("totalAllSemesterCredits")
        .map(|v| v.is_null())
        .unwrap_or(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn search_validates_identifiers_and_semester_selection() {
    let workspace = temp_dir("gradetrack-results-validate");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let _ = request(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_grades(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "v1",
        "results.search",
        json!({ "semesters": ["Sem 1"] }),
    );
    assert_eq!(error_code(&resp), Some("bad_params"));
    assert_eq!(
        error_message(&resp),
        Some("Please enter registration or name.")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "v2",
        "results.search",
        json!({ "registration": "210101120001", "semesters": ["  ", ""] }),
    );
    assert_eq!(error_code(&resp), Some("bad_params"));
    assert_eq!(
        error_message(&resp),
        Some("Please select at least one semester.")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "v3",
        "results.search",
        json!({ "registration": "219999999999", "semesters": ["Sem 1"] }),
    );
    let result = resp.get("result").expect("result");
    assert_eq!(result.get("count").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(
        result.get("message").and_then(|v| v.as_str()),
        Some("No records found for the selected criteria.")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn semester_lists_cover_store_and_single_student() {
    let workspace = temp_dir("gradetrack-results-semlist");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let _ = request(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_grades(&mut stdin, &mut reader);

    let resp = request(&mut stdin, &mut reader, "l1", "results.semesters", json!({}));
    let sems: Vec<&str> = resp
        .get("result")
        .and_then(|v| v.get("semesters"))
        .and_then(|v| v.as_array())
        .expect("semesters")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(sems, vec!["Sem 1", "Sem 2", "Sem 3"]);

    let resp = request(
        &mut stdin,
        &mut reader,
        "l2",
        "results.studentSemesters",
        json!({ "registration": "210101120002" }),
    );
    let sems: Vec<&str> = resp
        .get("result")
        .and_then(|v| v.get("semesters"))
        .and_then(|v| v.as_array())
        .expect("semesters")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(sems, vec!["Sem 1"]);

    let resp = request(
        &mut stdin,
        &mut reader,
        "l3",
        "results.studentSemesters",
        json!({}),
    );
    let sems = resp
        .get("result")
        .and_then(|v| v.get("semesters"))
        .and_then(|v| v.as_array())
        .expect("semesters");
    assert!(sems.is_empty());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

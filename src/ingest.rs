//! Bulk ingestion of result-sheet rows. Handles the header spellings
//! seen across university exports and applies the re-upload policy:
//! an existing grade is only replaced while it is still a backlog.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::store::{Field, NewGradeRecord, Predicate, RecordStore};

/// Maps canonical record fields to whichever header the sheet used.
pub struct ColumnMap {
    reg_no: Option<String>,
    name: Option<String>,
    sem: Option<String>,
    subject_code: Option<String>,
    subject_name: Option<String>,
    credits: Option<String>,
    grade: Option<String>,
    subject_type: Option<String>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let lookup: HashMap<String, &String> = headers
            .iter()
            .map(|h| (h.trim().to_lowercase(), h))
            .collect();
        let pick = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|n| lookup.get(&n.to_lowercase()).map(|h| (*h).clone()))
        };
        ColumnMap {
            reg_no: pick(&["Reg_No", "Registration No."]),
            name: pick(&["Name"]),
            sem: pick(&["Sem"]),
            subject_code: pick(&["Subject_Code", "Subject Code"]),
            subject_name: pick(&["Subject_Name", "Subject Name"]),
            credits: pick(&["Credits", "Credit"]),
            grade: pick(&["Grade", "Grade Point"]),
            subject_type: pick(&["Subject_Type", "Subject Type"]),
        }
    }
}

fn cell<'a>(row: &'a HashMap<String, String>, col: &Option<String>) -> &'a str {
    col.as_deref()
        .and_then(|c| row.get(c))
        .map(|v| v.trim())
        .unwrap_or("")
}

/// Grades that a fresh upload may overwrite. Anything already passed
/// stays untouched on re-upload.
fn grade_is_replaceable(grade: &str) -> bool {
    matches!(grade, "F" | "S" | "M" | "I" | "R" | "")
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Upserts sheet rows one at a time. Rows without both a registration
/// number and a subject code are skipped.
pub fn ingest_rows(
    store: &RecordStore,
    headers: &[String],
    rows: &[HashMap<String, String>],
) -> rusqlite::Result<IngestSummary> {
    let map = ColumnMap::resolve(headers);
    let mut summary = IngestSummary::default();

    for row in rows {
        let reg_no = cell(row, &map.reg_no).to_uppercase();
        let subject_code = cell(row, &map.subject_code).to_uppercase();
        if reg_no.is_empty() || subject_code.is_empty() {
            continue;
        }
        let grade = cell(row, &map.grade).to_uppercase();
        let sem_raw = cell(row, &map.sem);
        let sem = if !sem_raw.is_empty() && sem_raw.chars().all(|c| c.is_ascii_digit()) {
            format!("Sem {}", sem_raw)
        } else {
            sem_raw.to_string()
        };

        let key = Predicate::And(vec![
            Predicate::Eq(Field::RegNo, reg_no.clone()),
            Predicate::Eq(Field::SubjectCode, subject_code.clone()),
        ]);
        match store.find_grade(&key)? {
            Some(existing) => {
                if grade_is_replaceable(&existing.grade) {
                    store.set_grade(&key, &grade)?;
                    summary.updated += 1;
                }
            }
            None => {
                store.insert_grade(&NewGradeRecord {
                    reg_no,
                    name: cell(row, &map.name).to_string(),
                    sem,
                    subject_code,
                    subject_name: cell(row, &map.subject_name).to_string(),
                    credits: cell(row, &map.credits).to_string(),
                    grade,
                    subject_type: cell(row, &map.subject_type).to_string(),
                })?;
                summary.inserted += 1;
            }
        }
    }
    Ok(summary)
}

/// Reads an upload file into headers plus name→value rows. Ragged rows
/// are tolerated; missing cells resolve to empty strings.
pub fn read_csv_sheet(path: &Path) -> anyhow::Result<(Vec<String>, Vec<HashMap<String, String>>)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for rec in reader.records() {
        let rec = rec?;
        let mut row = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            row.insert(h.clone(), rec.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

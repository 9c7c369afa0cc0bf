//! CBCS basket reconciliation. Joins a student's grade rows against
//! the curriculum catalogue and reports earned versus required credits
//! for each of the five baskets.
//!
//! Completed subjects missing from the catalogue are not dropped; they
//! land in Basket V as default assignments so their credits still
//! count toward the overall total.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::calc::{credit_total_normalized, round1};
use crate::regcode;
use crate::store::{Field, GradeRecord, Predicate, RecordStore};

pub const BASKET_NAMES: [&str; 5] = [
    "Basket I",
    "Basket II",
    "Basket III",
    "Basket IV",
    "Basket V",
];

/// Credit requirement per basket, fixed by the CBCS regulation.
pub fn required_credits(basket: &str) -> f64 {
    match basket {
        "Basket I" => 17.0,
        "Basket II" => 12.0,
        "Basket III" => 25.0,
        "Basket IV" => 58.0,
        "Basket V" => 48.0,
        _ => 0.0,
    }
}

pub fn total_required_credits() -> f64 {
    BASKET_NAMES.iter().map(|b| required_credits(b)).sum()
}

/// Folds catalogue spellings onto the five canonical names. Unlabelled
/// entries default to Basket V; unrecognized labels pass through and
/// drop out at assembly.
pub fn canonical_basket(raw: &str) -> &str {
    match raw {
        "Basket 1" | "Basket I" => "Basket I",
        "Basket 2" | "Basket II" => "Basket II",
        "Basket 3" | "Basket III" => "Basket III",
        "Basket 4" | "Basket IV" => "Basket IV",
        "Basket 5" | "Basket V" | "" | "null" => "Basket V",
        other => other,
    }
}

#[derive(Debug)]
pub struct TrackError {
    pub code: &'static str,
    pub message: String,
}

impl TrackError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSubject {
    pub code: String,
    pub name: String,
    pub credits: String,
    pub credits_numeric: f64,
    pub completed: bool,
    pub semester: Option<String>,
    pub earned_credits: f64,
    pub original_basket: String,
    pub branch: String,
    pub is_default_assigned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketProgress {
    pub name: String,
    pub subjects: Vec<TrackedSubject>,
    pub total_subjects: usize,
    pub completed_subjects: usize,
    pub required_credits: f64,
    pub earned_credits: f64,
    pub pending_credits: f64,
    pub percentage: f64,
    pub status: String,
    pub is_completed: bool,
    pub has_default_subjects: bool,
    pub default_assigned_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_subjects: usize,
    pub completed_subjects: usize,
    pub total_required_credits: f64,
    pub total_earned_credits: f64,
    pub baskets_completed: usize,
    pub total_baskets: usize,
    pub default_assigned_subjects: usize,
    pub percentage: f64,
    pub overall_status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackModel {
    pub name: String,
    pub registration: String,
    pub department: String,
    pub overall_stats: OverallStats,
    pub baskets: Vec<BasketProgress>,
}

fn db_err(e: rusqlite::Error) -> TrackError {
    TrackError::new("db_query_failed", e.to_string())
}

/// Builds the full reconciliation model for one student.
///
/// `semesters` narrows the student's completed rows when non-empty and
/// not containing "All". `basket_filter` narrows the catalogue fetch;
/// all five baskets still appear in the output.
pub fn compute_basket_progress(
    store: &RecordStore,
    registration: &str,
    semesters: &[String],
    basket_filter: &str,
) -> Result<TrackModel, TrackError> {
    let student = store
        .find_grade(&Predicate::Eq(Field::RegNo, registration.to_string()))
        .map_err(db_err)?
        .ok_or_else(|| TrackError::new("not_found", "Student not found"))?;

    let department = regcode::branch_name(registration);
    let branch_short = regcode::branch_short(registration);

    let semesters: Vec<String> = semesters
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let mut student_clauses = vec![Predicate::Eq(Field::RegNo, registration.to_string())];
    if !semesters.is_empty() && !semesters.iter().any(|s| s == "All") {
        student_clauses.push(Predicate::InSet(Field::Sem, semesters));
    }
    let student_rows = store
        .find_grades(&Predicate::And(student_clauses), &[Field::Sem, Field::SubjectCode])
        .map_err(db_err)?;

    // Catalogue rows for this branch: exact branch, shared "All"
    // entries, and entries listing several branches in one cell.
    let mut branch_alternatives = vec![
        Predicate::Eq(Field::Branch, "All".to_string()),
        Predicate::Eq(Field::Branch, branch_short.clone()),
    ];
    if branch_short != "Unknown" {
        branch_alternatives.push(Predicate::ContainsNoCase(Field::Branch, branch_short.clone()));
    }
    let mut catalogue_clauses = vec![Predicate::Or(branch_alternatives)];
    if !basket_filter.is_empty() && basket_filter != "All" {
        catalogue_clauses.push(Predicate::Eq(Field::Basket, basket_filter.to_string()));
    }
    let catalogue = store
        .find_subjects(&Predicate::And(catalogue_clauses), &[Field::SubjectCode])
        .map_err(db_err)?;

    let by_code: HashMap<&str, &GradeRecord> = student_rows
        .iter()
        .map(|r| (r.subject_code.as_str(), r))
        .collect();

    let mut groups: BTreeMap<String, Vec<TrackedSubject>> = BTreeMap::new();
    let mut matched: HashSet<&str> = HashSet::new();
    for subject in &catalogue {
        let completed = by_code.get(subject.subject_code.as_str());
        if completed.is_some() {
            matched.insert(subject.subject_code.as_str());
        }
        let credits_numeric = credit_total_normalized(&subject.credits);
        groups
            .entry(canonical_basket(&subject.basket).to_string())
            .or_default()
            .push(TrackedSubject {
                code: subject.subject_code.clone(),
                name: subject.subject_name.clone(),
                credits: subject.credits.clone(),
                credits_numeric,
                completed: completed.is_some(),
                semester: completed.map(|r| r.sem.clone()),
                earned_credits: if completed.is_some() {
                    credits_numeric
                } else {
                    0.0
                },
                original_basket: subject.basket.clone(),
                branch: subject.branch.clone(),
                is_default_assigned: false,
            });
    }

    // Completed subjects absent from the catalogue default to Basket V.
    let mut default_assigned = 0usize;
    for row in &student_rows {
        if matched.contains(row.subject_code.as_str()) {
            continue;
        }
        let credits_numeric = credit_total_normalized(&row.credits);
        default_assigned += 1;
        groups
            .entry("Basket V".to_string())
            .or_default()
            .push(TrackedSubject {
                code: row.subject_code.clone(),
                name: row.subject_name.clone(),
                credits: row.credits.clone(),
                credits_numeric,
                completed: true,
                semester: Some(row.sem.clone()),
                earned_credits: credits_numeric,
                original_basket: "Unknown".to_string(),
                branch: "Unknown".to_string(),
                is_default_assigned: true,
            });
    }

    let mut baskets = Vec::with_capacity(BASKET_NAMES.len());
    let mut overall = OverallStats {
        total_subjects: 0,
        completed_subjects: 0,
        total_required_credits: total_required_credits(),
        total_earned_credits: 0.0,
        baskets_completed: 0,
        total_baskets: BASKET_NAMES.len(),
        default_assigned_subjects: default_assigned,
        percentage: 0.0,
        overall_status: String::new(),
    };
    for name in BASKET_NAMES {
        let subjects = groups.remove(name).unwrap_or_default();
        let required = required_credits(name);
        let earned: f64 = subjects
            .iter()
            .filter(|s| s.completed)
            .map(|s| s.earned_credits)
            .sum();
        let completed_subjects = subjects.iter().filter(|s| s.completed).count();
        let default_count = subjects.iter().filter(|s| s.is_default_assigned).count();
        let is_completed = earned >= required;
        let status = if is_completed {
            "Completed"
        } else if earned == 0.0 {
            "Not Started"
        } else {
            "Not Completed"
        };
        let percentage = if required > 0.0 {
            round1(earned / required * 100.0)
        } else {
            0.0
        };

        overall.total_subjects += subjects.len();
        overall.completed_subjects += completed_subjects;
        overall.total_earned_credits += earned;
        if is_completed {
            overall.baskets_completed += 1;
        }

        baskets.push(BasketProgress {
            name: name.to_string(),
            total_subjects: subjects.len(),
            completed_subjects,
            required_credits: required,
            earned_credits: earned,
            pending_credits: (required - earned).max(0.0),
            percentage,
            status: status.to_string(),
            is_completed,
            has_default_subjects: default_count > 0,
            default_assigned_count: default_count,
            subjects,
        });
    }

    overall.percentage = if overall.total_required_credits > 0.0 {
        round1(overall.total_earned_credits / overall.total_required_credits * 100.0)
    } else {
        0.0
    };
    overall.overall_status = if overall.baskets_completed == overall.total_baskets {
        "Completed".to_string()
    } else {
        "In Progress".to_string()
    };

    Ok(TrackModel {
        name: student.name,
        registration: registration.to_string(),
        department,
        overall_stats: overall,
        baskets,
    })
}

//! Turns raw search inputs from the backlog and batch views into store
//! predicates, with the precedence rules of the result-sheet UI:
//! registration number wins over subject code, which wins over the
//! branch/year dropdowns.

use crate::calc::BACKLOG_GRADES;
use crate::regcode;
use crate::store::{Field, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Registration,
    SubjectCode,
    Advanced,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Registration => "registration",
            SearchMode::SubjectCode => "subject_code",
            SearchMode::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacklogQuery {
    pub predicate: Predicate,
    pub mode: SearchMode,
    /// Human-readable description of each active filter.
    pub criteria: Vec<String>,
    pub registration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchQuery {
    pub predicate: Predicate,
    pub criteria: Vec<String>,
}

fn backlog_grades_clause() -> Predicate {
    Predicate::InSet(
        Field::Grade,
        BACKLOG_GRADES.iter().map(|g| g.to_string()).collect(),
    )
}

/// Maps a branch selection to the registration-digit filter. The input
/// may be a short form ("CSE") or a full department name.
fn branch_clause(branch: &str, criteria: &mut Vec<String>) -> Result<Predicate, String> {
    let Some(code) = regcode::branch_code(branch) else {
        return Err(format!(
            "Invalid branch selection: {}. Valid options: Civil, CSE, ECE, EEE, Mechanical",
            branch
        ));
    };
    criteria.push(format!("Branch: {}", branch));
    Ok(Predicate::CharAt(Field::RegNo, 7, code))
}

/// Accepts "21" or "2021" style years and filters on the two leading
/// registration digits. `label` is "Year" or "Batch" depending on view.
fn year_clause(year: &str, label: &str, criteria: &mut Vec<String>) -> Result<Predicate, String> {
    let digits = year.chars().all(|c| c.is_ascii_digit());
    let short = if digits && year.len() == 4 {
        year[2..].to_string()
    } else if digits && year.len() == 2 {
        year.to_string()
    } else {
        return Err(format!(
            "Invalid {} format: {}. Use format: 21, 22, 2021, 2022, etc.",
            label.to_ascii_lowercase(),
            year
        ));
    };
    criteria.push(format!("{}: {}", label, year));
    Ok(Predicate::HasPrefix(Field::RegNo, short))
}

/// Resolves the backlog search form. Exactly one mode applies per
/// search; branch and year only narrow subject-code and advanced modes.
pub fn build_backlog_query(
    registration: &str,
    subject_code: &str,
    branch: &str,
    year: &str,
) -> Result<BacklogQuery, String> {
    let registration = registration.trim().to_uppercase();
    let subject_code = subject_code.trim().to_uppercase();
    let branch = branch.trim();
    let year = year.trim();

    let mut clauses = vec![backlog_grades_clause()];
    let mut criteria = Vec::new();

    if !registration.is_empty() {
        clauses.push(Predicate::Eq(Field::RegNo, registration.clone()));
        criteria.push(format!("Registration: {}", registration));
        return Ok(BacklogQuery {
            predicate: Predicate::And(clauses),
            mode: SearchMode::Registration,
            criteria,
            registration: Some(registration),
        });
    }

    if !subject_code.is_empty() {
        clauses.push(Predicate::Eq(Field::SubjectCode, subject_code.clone()));
        criteria.push(format!("Subject Code: {}", subject_code));
        if !branch.is_empty() {
            clauses.push(branch_clause(branch, &mut criteria)?);
        }
        if !year.is_empty() {
            clauses.push(year_clause(year, "Year", &mut criteria)?);
        }
        return Ok(BacklogQuery {
            predicate: Predicate::And(clauses),
            mode: SearchMode::SubjectCode,
            criteria,
            registration: None,
        });
    }

    if branch.is_empty() && year.is_empty() {
        return Err(
            "Please enter a registration number, subject code, or select branch/year to search."
                .to_string(),
        );
    }
    if !branch.is_empty() {
        clauses.push(branch_clause(branch, &mut criteria)?);
    }
    if !year.is_empty() {
        clauses.push(year_clause(year, "Year", &mut criteria)?);
    }
    Ok(BacklogQuery {
        predicate: Predicate::And(clauses),
        mode: SearchMode::Advanced,
        criteria,
        registration: None,
    })
}

/// Resolves the batch view form. Unlike backlog, there is no grade
/// filter; the result is every record of the selected cohort.
pub fn build_batch_query(branch: &str, batch: &str) -> Result<BatchQuery, String> {
    let branch = branch.trim();
    let batch = batch.trim();

    if branch.is_empty() && batch.is_empty() {
        return Err("Please select branch and/or batch to view data.".to_string());
    }

    let mut clauses = Vec::new();
    let mut criteria = Vec::new();
    if !branch.is_empty() {
        clauses.push(branch_clause(branch, &mut criteria)?);
    }
    if !batch.is_empty() {
        clauses.push(year_clause(batch, "Batch", &mut criteria)?);
    }
    Ok(BatchQuery {
        predicate: Predicate::And(clauses),
        criteria,
    })
}

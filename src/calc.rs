use serde::Serialize;

/// 1-decimal rounding used across progress reports:
/// `Int(10*x + 0.5) / 10`
pub fn round1(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Letter grades that mark a subject as a pending backlog.
pub const BACKLOG_GRADES: [&str; 5] = ["F", "M", "S", "I", "R"];

/// Closed alphabet accepted by manual grade corrections.
pub const VALID_GRADES: [&str; 11] = ["O", "E", "A", "B", "C", "D", "F", "M", "S", "I", "R"];

/// Grade points on the ten-point letter scale. A grade outside the
/// table is read as a literal numeric grade-point value; anything else
/// counts as 0.
pub fn grade_points(grade: &str) -> f64 {
    match grade.trim() {
        "O" => 10.0,
        "E" => 9.0,
        "A" => 8.0,
        "B" => 7.0,
        "C" => 6.0,
        "D" => 5.0,
        "S" | "M" | "F" | "I" | "R" => 0.0,
        other => other.parse::<f64>().unwrap_or(0.0),
    }
}

/// Trimmed, non-empty components of a `+`-separated credit encoding.
/// A plain value like "3" is a single component; "2+1" has two.
pub fn credit_parts(raw: &str) -> Vec<&str> {
    raw.split('+')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn sum_parts(raw: &str) -> f64 {
    let mut total = 0.0_f64;
    for part in credit_parts(raw) {
        match part.parse::<f64>() {
            Ok(v) => total += v,
            // One bad component poisons the whole encoding.
            Err(_) => return 0.0,
        }
    }
    total
}

/// Total credits from the raw encoding ("3", "2+1", "3+0+1", ...).
/// Never fails: blank or unparseable input counts as 0.
pub fn credit_total(raw: &str) -> f64 {
    sum_parts(raw)
}

/// Variant that first folds the `--` separator spelling into `+`, so
/// "2--0--1" reads as 2+0+1. Curriculum catalogue rows use this form;
/// grade records keep the plain variant.
pub fn credit_total_normalized(raw: &str) -> f64 {
    sum_parts(&raw.replace("--", "+"))
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub average: f64,
    pub total_credits: f64,
}

/// Credit-weighted grade-point average over (credits, grade) rows.
/// Rows whose credit encoding has no components are skipped entirely;
/// a zero credit total yields an average of 0 rather than an error.
/// The same calculation serves SGPA (one semester's rows) and CGPA
/// (every row the student has).
pub fn credit_weighted_average<'a, I>(rows: I) -> GpaSummary
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut total_credits = 0.0_f64;
    let mut total_weighted = 0.0_f64;

    for (credits, grade) in rows {
        if credit_parts(credits).is_empty() {
            continue;
        }
        let row_credits = credit_total(credits);
        total_credits += row_credits;
        total_weighted += grade_points(grade) * row_credits;
    }

    let average = if total_credits > 0.0 {
        total_weighted / total_credits
    } else {
        0.0
    };
    GpaSummary {
        average,
        total_credits,
    }
}

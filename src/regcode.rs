//! Registration number decoding. Numbers are at least ten characters;
//! the first two carry the admission-year code and the character at
//! offset 7 carries the branch digit (e.g. "210101120045" reads as a
//! 2021 Computer Science Engineering admission).

/// Display name of the branch encoded at offset 7, or
/// "Invalid Registration" for numbers too short to carry one.
pub fn branch_name(reg_no: &str) -> String {
    let chars: Vec<char> = reg_no.chars().collect();
    if chars.len() < 10 {
        return "Invalid Registration".to_string();
    }
    match chars[7] {
        '1' => "Civil Engineering",
        '2' => "Computer Science Engineering",
        '3' => "Electronics & Communication Engineering",
        '5' => "Electrical & Electronics Engineering",
        '6' => "Mechanical Engineering",
        _ => "Unknown Branch",
    }
    .to_string()
}

/// First word of the branch display name ("Computer", "Civil", ...),
/// or "Unknown" when the branch digit has no mapping.
pub fn branch_short(reg_no: &str) -> String {
    let name = branch_name(reg_no);
    if name == "Unknown Branch" {
        return "Unknown".to_string();
    }
    name.split_whitespace()
        .next()
        .unwrap_or("Unknown")
        .to_string()
}

/// Admission year from the two-character prefix. Codes outside the
/// known table synthesize a "20xx" year; shorter input is "Unknown".
pub fn admission_year(reg_no: &str) -> String {
    let code: String = reg_no.chars().take(2).collect();
    if code.chars().count() < 2 {
        return "Unknown".to_string();
    }
    match code.as_str() {
        "20" => "2020".to_string(),
        "21" => "2021".to_string(),
        "22" => "2022".to_string(),
        "23" => "2023".to_string(),
        "24" => "2024".to_string(),
        "25" => "2025".to_string(),
        "26" => "2026".to_string(),
        "27" => "2027".to_string(),
        "28" => "2028".to_string(),
        "29" => "2029".to_string(),
        other => format!("20{}", other),
    }
}

/// Resolves free-text branch input (short form, plain name, or full
/// display name) to the registration branch digit. Matching is exact
/// after trimming and lowercasing; unknown text stays unresolved
/// rather than guessing.
pub fn branch_code(input: &str) -> Option<char> {
    match input.trim().to_lowercase().as_str() {
        "civil" | "civil engineering" => Some('1'),
        "cse" | "computer science" | "computer science engineering" => Some('2'),
        "ece" | "electronics" | "electronics & communication"
        | "electronics & communication engineering" => Some('3'),
        "eee" | "electrical" | "electrical & electronics"
        | "electrical & electronics engineering" => Some('5'),
        "mechanical" | "mechanical engineering" => Some('6'),
        _ => None,
    }
}

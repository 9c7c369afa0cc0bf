use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub const DB_FILE: &str = "gradetrack.sqlite3";

/// Columns addressable by predicates, across both record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RegNo,
    Name,
    Sem,
    SubjectCode,
    SubjectName,
    Grade,
    Branch,
    Basket,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Field::RegNo => "reg_no",
            Field::Name => "name",
            Field::Sem => "sem",
            Field::SubjectCode => "subject_code",
            Field::SubjectName => "subject_name",
            Field::Grade => "grade",
            Field::Branch => "branch",
            Field::Basket => "basket",
        }
    }
}

/// Structured filter compiled to a SQL WHERE fragment with bound
/// parameters. Callers never assemble query text themselves.
#[derive(Debug, Clone)]
pub enum Predicate {
    All,
    Eq(Field, String),
    EqNoCase(Field, String),
    InSet(Field, Vec<String>),
    HasPrefix(Field, String),
    /// Single character at a zero-based offset.
    CharAt(Field, usize, char),
    ContainsNoCase(Field, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    fn write_sql(&self, out: &mut String, binds: &mut Vec<Value>) {
        match self {
            Predicate::All => out.push_str("1=1"),
            Predicate::Eq(field, value) => {
                let _ = write!(out, "{} = ?", field.column());
                binds.push(Value::Text(value.clone()));
            }
            Predicate::EqNoCase(field, value) => {
                let _ = write!(out, "{} = ? COLLATE NOCASE", field.column());
                binds.push(Value::Text(value.clone()));
            }
            Predicate::InSet(field, values) => {
                if values.is_empty() {
                    out.push_str("1=0");
                    return;
                }
                let placeholders = std::iter::repeat("?")
                    .take(values.len())
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = write!(out, "{} IN ({})", field.column(), placeholders);
                for v in values {
                    binds.push(Value::Text(v.clone()));
                }
            }
            Predicate::HasPrefix(field, prefix) => {
                let _ = write!(
                    out,
                    "substr({}, 1, {}) = ?",
                    field.column(),
                    prefix.chars().count()
                );
                binds.push(Value::Text(prefix.clone()));
            }
            Predicate::CharAt(field, index, ch) => {
                let _ = write!(out, "substr({}, {}, 1) = ?", field.column(), index + 1);
                binds.push(Value::Text(ch.to_string()));
            }
            Predicate::ContainsNoCase(field, needle) => {
                let _ = write!(out, "instr(lower({}), ?) > 0", field.column());
                binds.push(Value::Text(needle.to_lowercase()));
            }
            Predicate::And(parts) => {
                if parts.is_empty() {
                    out.push_str("1=1");
                    return;
                }
                out.push('(');
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" AND ");
                    }
                    p.write_sql(out, binds);
                }
                out.push(')');
            }
            Predicate::Or(parts) => {
                if parts.is_empty() {
                    out.push_str("1=0");
                    return;
                }
                out.push('(');
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" OR ");
                    }
                    p.write_sql(out, binds);
                }
                out.push(')');
            }
        }
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        self.write_sql(&mut sql, &mut binds);
        (sql, binds)
    }
}

/// One (student, subject) grade row as uploaded from result sheets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: String,
    pub reg_no: String,
    pub name: String,
    pub sem: String,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: String,
    pub grade: String,
    pub subject_type: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewGradeRecord {
    pub reg_no: String,
    pub name: String,
    pub sem: String,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: String,
    pub grade: String,
    pub subject_type: String,
}

/// One curriculum catalogue entry (branch, basket, subject).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueSubject {
    pub id: String,
    pub branch: String,
    pub basket: String,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: String,
}

#[derive(Debug, Clone)]
pub struct NewCatalogueSubject {
    pub branch: String,
    pub basket: String,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: String,
}

const GRADE_COLUMNS: &str =
    "id, reg_no, name, sem, subject_code, subject_name, credits, grade, subject_type, updated_at";
const SUBJECT_COLUMNS: &str = "id, branch, basket, subject_code, subject_name, credits";

fn grade_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        id: r.get(0)?,
        reg_no: r.get(1)?,
        name: r.get(2)?,
        sem: r.get(3)?,
        subject_code: r.get(4)?,
        subject_name: r.get(5)?,
        credits: r.get(6)?,
        grade: r.get(7)?,
        subject_type: r.get(8)?,
        updated_at: r.get(9)?,
    })
}

fn subject_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogueSubject> {
    Ok(CatalogueSubject {
        id: r.get(0)?,
        branch: r.get(1)?,
        basket: r.get(2)?,
        subject_code: r.get(3)?,
        subject_name: r.get(4)?,
        credits: r.get(5)?,
    })
}

fn order_sql(order_by: &[Field]) -> String {
    if order_by.is_empty() {
        // Deterministic insertion order, matching upload sequence.
        return " ORDER BY rowid".to_string();
    }
    let cols: Vec<&str> = order_by.iter().map(|f| f.column()).collect();
    format!(" ORDER BY {}", cols.join(", "))
}

/// SQLite-backed store for grade records and the curriculum catalogue.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(DB_FILE))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn find_grades(
        &self,
        pred: &Predicate,
        order_by: &[Field],
    ) -> rusqlite::Result<Vec<GradeRecord>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT {} FROM grade_records WHERE {}{}",
            GRADE_COLUMNS,
            where_sql,
            order_sql(order_by)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(binds), grade_row)?;
        rows.collect()
    }

    pub fn find_grade(&self, pred: &Predicate) -> rusqlite::Result<Option<GradeRecord>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT {} FROM grade_records WHERE {} ORDER BY rowid LIMIT 1",
            GRADE_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params_from_iter(binds), grade_row).optional()
    }

    pub fn distinct_grade_values(
        &self,
        field: Field,
        pred: &Predicate,
    ) -> rusqlite::Result<Vec<String>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT DISTINCT {col} FROM grade_records WHERE {} ORDER BY {col}",
            where_sql,
            col = field.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(binds), |r| r.get::<_, String>(0))?;
        rows.collect()
    }

    pub fn insert_grade(&self, rec: &NewGradeRecord) -> rusqlite::Result<String> {
        let id = Uuid::new_v4().to_string();
        let updated_at = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO grade_records(
                id, reg_no, name, sem, subject_code, subject_name,
                credits, grade, subject_type, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                &rec.reg_no,
                &rec.name,
                &rec.sem,
                &rec.subject_code,
                &rec.subject_name,
                &rec.credits,
                &rec.grade,
                &rec.subject_type,
                &updated_at,
            ),
        )?;
        Ok(id)
    }

    /// Sets the grade of the first matching record (at most one row).
    pub fn set_grade(&self, pred: &Predicate, grade: &str) -> rusqlite::Result<usize> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "UPDATE grade_records SET grade = ?, updated_at = ?
             WHERE id = (SELECT id FROM grade_records WHERE {} ORDER BY rowid LIMIT 1)",
            where_sql
        );
        let mut all_binds: Vec<Value> = Vec::with_capacity(binds.len() + 2);
        all_binds.push(Value::Text(grade.to_string()));
        all_binds.push(Value::Text(Utc::now().to_rfc3339()));
        all_binds.extend(binds);
        self.conn.execute(&sql, params_from_iter(all_binds))
    }

    pub fn find_subjects(
        &self,
        pred: &Predicate,
        order_by: &[Field],
    ) -> rusqlite::Result<Vec<CatalogueSubject>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT {} FROM catalogue_subjects WHERE {}{}",
            SUBJECT_COLUMNS,
            where_sql,
            order_sql(order_by)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(binds), subject_row)?;
        rows.collect()
    }

    pub fn find_subjects_page(
        &self,
        pred: &Predicate,
        limit: i64,
        offset: i64,
    ) -> rusqlite::Result<Vec<CatalogueSubject>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT {} FROM catalogue_subjects WHERE {} ORDER BY rowid LIMIT ? OFFSET ?",
            SUBJECT_COLUMNS, where_sql
        );
        let mut all_binds = binds;
        all_binds.push(Value::Integer(limit));
        all_binds.push(Value::Integer(offset));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(all_binds), subject_row)?;
        rows.collect()
    }

    pub fn count_subjects(&self, pred: &Predicate) -> rusqlite::Result<i64> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!("SELECT COUNT(*) FROM catalogue_subjects WHERE {}", where_sql);
        self.conn
            .query_row(&sql, params_from_iter(binds), |r| r.get(0))
    }

    pub fn distinct_subject_values(
        &self,
        field: Field,
        pred: &Predicate,
    ) -> rusqlite::Result<Vec<String>> {
        let (where_sql, binds) = pred.where_clause();
        let sql = format!(
            "SELECT DISTINCT {col} FROM catalogue_subjects WHERE {} ORDER BY {col}",
            where_sql,
            col = field.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(binds), |r| r.get::<_, String>(0))?;
        rows.collect()
    }

    pub fn insert_subject(&self, sub: &NewCatalogueSubject) -> rusqlite::Result<String> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO catalogue_subjects(id, branch, basket, subject_code, subject_name, credits)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &id,
                &sub.branch,
                &sub.basket,
                &sub.subject_code,
                &sub.subject_name,
                &sub.credits,
            ),
        )?;
        Ok(id)
    }

    pub fn update_subject(&self, id: &str, sub: &NewCatalogueSubject) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE catalogue_subjects
             SET branch = ?, basket = ?, subject_code = ?, subject_name = ?, credits = ?
             WHERE id = ?",
            (
                &sub.branch,
                &sub.basket,
                &sub.subject_code,
                &sub.subject_name,
                &sub.credits,
                id,
            ),
        )
    }

    pub fn delete_subject(&self, id: &str) -> rusqlite::Result<usize> {
        self.conn
            .execute("DELETE FROM catalogue_subjects WHERE id = ?", [id])
    }

    /// Replaces the whole catalogue in one transaction (CSV import).
    pub fn replace_subjects(&self, subs: &[NewCatalogueSubject]) -> rusqlite::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM catalogue_subjects", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO catalogue_subjects(id, branch, basket, subject_code, subject_name, credits)
                 VALUES(?, ?, ?, ?, ?, ?)",
            )?;
            for sub in subs {
                stmt.execute((
                    Uuid::new_v4().to_string(),
                    &sub.branch,
                    &sub.basket,
                    &sub.subject_code,
                    &sub.subject_name,
                    &sub.credits,
                ))?;
            }
        }
        tx.commit()?;
        Ok(subs.len())
    }
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_records(
            id TEXT PRIMARY KEY,
            reg_no TEXT NOT NULL,
            name TEXT NOT NULL,
            sem TEXT NOT NULL,
            subject_code TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            credits TEXT NOT NULL,
            grade TEXT NOT NULL,
            subject_type TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(reg_no, subject_code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_reg ON grade_records(reg_no)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_sem ON grade_records(sem)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_reg_sem ON grade_records(reg_no, sem)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_name ON grade_records(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_subject ON grade_records(subject_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalogue_subjects(
            id TEXT PRIMARY KEY,
            branch TEXT NOT NULL,
            basket TEXT NOT NULL,
            subject_code TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            credits TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalogue_subjects_code ON catalogue_subjects(subject_code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalogue_subjects_branch ON catalogue_subjects(branch)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalogue_subjects_basket ON catalogue_subjects(basket)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalogue_subjects_code_branch ON catalogue_subjects(subject_code, branch)",
        [],
    )?;

    Ok(())
}

//! SQLite-backed repository for the college → department → subject tree.

use crate::model::{College, Department, Subject};
use crate::persistence::traits::{AcademicRepository, SUBJECT_SEARCH_LIMIT};
use crate::persistence::{now_timestamp, PersistenceError};

use super::helpers::{format_id, map_constraint, parse_reference};
use super::SqliteRepository;

impl AcademicRepository for SqliteRepository {
    async fn list_colleges(&self) -> Result<Vec<College>, PersistenceError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM colleges ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| College {
                id: format_id(id),
                name,
            })
            .collect())
    }

    async fn list_departments(&self, college_id: &str) -> Result<Vec<Department>, PersistenceError> {
        let Ok(college) = parse_reference(college_id, "college") else {
            return Ok(vec![]);
        };
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, college_id FROM departments WHERE college_id = ? ORDER BY name ASC",
        )
        .bind(college)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, college_id)| Department {
                id: format_id(id),
                name,
                college_id: format_id(college_id),
            })
            .collect())
    }

    async fn list_subjects(&self, department_id: &str) -> Result<Vec<Subject>, PersistenceError> {
        let Ok(department) = parse_reference(department_id, "department") else {
            return Ok(vec![]);
        };
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, name, department_id FROM subjects WHERE department_id = ? ORDER BY name ASC",
        )
        .bind(department)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(subject_from_row).collect())
    }

    async fn search_subjects(
        &self,
        query: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Subject>, PersistenceError> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let department = match department_id {
            Some(id) => match parse_reference(id, "department") {
                Ok(id) => Some(id),
                Err(_) => return Ok(vec![]),
            },
            None => None,
        };
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, name, department_id FROM subjects
            WHERE name LIKE ? ESCAPE '\'
              AND (? IS NULL OR department_id = ?)
            ORDER BY name ASC
            LIMIT ?
            "#,
        )
        .bind(pattern)
        .bind(department)
        .bind(department)
        .bind(SUBJECT_SEARCH_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(subject_from_row).collect())
    }

    async fn create_college(&self, name: &str) -> Result<College, PersistenceError> {
        let id = sqlx::query("INSERT INTO colleges (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(now_timestamp() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint(e, &format!("college {name:?}")))?
            .last_insert_rowid();
        Ok(College {
            id: format_id(id),
            name: name.to_string(),
        })
    }

    async fn create_department(
        &self,
        name: &str,
        college_id: &str,
    ) -> Result<Department, PersistenceError> {
        let college = parse_reference(college_id, "college")?;
        let id = sqlx::query("INSERT INTO departments (name, college_id, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(college)
            .bind(now_timestamp() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| map_constraint(e, &format!("department {name:?}")))?
            .last_insert_rowid();
        Ok(Department {
            id: format_id(id),
            name: name.to_string(),
            college_id: format_id(college),
        })
    }

    async fn create_subject(
        &self,
        name: &str,
        department_id: &str,
    ) -> Result<Subject, PersistenceError> {
        let department = parse_reference(department_id, "department")?;
        let id = sqlx::query(
            "INSERT INTO subjects (name, department_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(department)
        .bind(now_timestamp() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("subject {name:?}")))?
        .last_insert_rowid();
        Ok(Subject {
            id: format_id(id),
            name: name.to_string(),
            department_id: format_id(department),
        })
    }
}

fn subject_from_row((id, name, department_id): (i64, String, i64)) -> Subject {
    Subject {
        id: format_id(id),
        name,
        department_id: format_id(department_id),
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

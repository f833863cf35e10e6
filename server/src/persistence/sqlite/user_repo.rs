use crate::model::{NewUser, ProfileUpdate, User};
use crate::persistence::traits::UserRepository;
use crate::persistence::PersistenceError;

use super::helpers::{map_constraint, parse_optional_id, UserRow, USER_COLUMNS};
use super::SqliteRepository;

impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User, PersistenceError> {
        let a = &user.affiliation;
        let college_id = parse_optional_id(a.college_id.as_deref())?;
        let department_id = parse_optional_id(a.department_id.as_deref())?;

        let id = sqlx::query(
            r#"
            INSERT INTO users
                (email, name, password_hash, role, college_id, department_id,
                 education_year, semester, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(college_id)
        .bind(department_id)
        .bind(a.education_year.map(i64::from))
        .bind(a.semester.map(i64::from))
        .bind(user.created_at as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("user {}", user.email)))?
        .last_insert_rowid();

        self.load_user(&id.to_string())
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("user {id}")))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PersistenceError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn load_user(&self, id: &str) -> Result<Option<User>, PersistenceError> {
        let Ok(Some(id)) = parse_optional_id(Some(id)) else {
            return Ok(None);
        };
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<User, PersistenceError> {
        let a = &update.affiliation;
        let Ok(Some(user_id)) = parse_optional_id(Some(id)) else {
            return Err(PersistenceError::NotFound(format!("user {id}")));
        };
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = ?, college_id = ?, department_id = ?, education_year = ?, semester = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(parse_optional_id(a.college_id.as_deref())?)
        .bind(parse_optional_id(a.department_id.as_deref())?)
        .bind(a.education_year.map(i64::from))
        .bind(a.semester.map(i64::from))
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("user {id}")))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("user {id}")));
        }
        self.load_user(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("user {id}")))
    }
}

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use super::{unix_seconds, IdRemap, MigrationError, Migrator, Resolver};
use crate::model::{Role, MAX_EDUCATION_YEAR, MAX_SEMESTER};
use crate::persistence::document::schema::{UserDoc, USERS};
use crate::persistence::sqlite::helpers::{UserRow, USER_COLUMNS};
use crate::persistence::DocumentStore;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersReport {
    pub skipped: bool,
    pub migrated_count: u64,
    /// Relational key → document ID. Always the identity.
    pub user_ids: BTreeMap<i64, String>,
    pub dropped_references: u64,
}

impl UsersReport {
    pub(crate) fn resumed() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

impl<O: ObjectStorage> Migrator<O> {
    /// Users keep their relational key as document ID, so re-running the step
    /// overwrites rather than duplicates.
    pub(crate) async fn users_step(
        &self,
        store: &DocumentStore,
        remap: &mut IdRemap,
    ) -> Result<UsersReport, MigrationError> {
        remap.ensure_academic(store)?;

        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        info!(users = rows.len(), "Migrating users");

        let mut resolver = Resolver::new(self.policy);
        let mut user_ids = BTreeMap::new();

        for row in rows {
            let college_id =
                resolver.resolve(&remap.colleges, row.college_id, "user", row.id, "collegeId")?;
            let department_id = resolver.resolve(
                &remap.departments,
                row.department_id,
                "user",
                row.id,
                "departmentId",
            )?;
            let education_year = resolver.level(
                row.education_year,
                MAX_EDUCATION_YEAR,
                "user",
                row.id,
                "educationYear",
            )?;
            let semester = resolver.level(row.semester, MAX_SEMESTER, "user", row.id, "semester")?;
            let doc = UserDoc {
                email: row.email,
                name: row.name,
                password: row.password_hash,
                role: Role::parse(&row.role),
                college_id,
                department_id,
                education_year,
                semester,
                created_at: unix_seconds(row.created_at),
            };
            let doc_id = IdRemap::user(row.id);
            store.set(USERS, &doc_id, &doc)?;
            user_ids.insert(row.id, doc_id);
        }

        Ok(UsersReport {
            skipped: false,
            migrated_count: user_ids.len() as u64,
            user_ids,
            dropped_references: resolver.dropped(),
        })
    }
}

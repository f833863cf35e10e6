use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use super::{unix_seconds, IdRemap, MigrationError, Migrator, Resolver};
use crate::persistence::document::schema::{
    CollegeDoc, DepartmentDoc, SubjectDoc, COLLEGES, DEPARTMENTS, SUBJECTS,
};
use crate::persistence::DocumentStore;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicReport {
    pub skipped: bool,
    pub college_ids: BTreeMap<i64, String>,
    pub department_ids: BTreeMap<i64, String>,
    pub subject_ids: BTreeMap<i64, String>,
    pub dropped_references: u64,
}

impl AcademicReport {
    pub(crate) fn resumed() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

impl<O: ObjectStorage> Migrator<O> {
    /// Copy the hierarchy parents-first so every child can resolve its parent.
    /// Skipped as a whole when the document store already has a college.
    pub(crate) async fn academic_step(
        &self,
        store: &DocumentStore,
        remap: &mut IdRemap,
    ) -> Result<AcademicReport, MigrationError> {
        if !store.is_empty(COLLEGES)? {
            info!("Document store already has colleges, skipping academic migration");
            return Ok(AcademicReport::resumed());
        }

        let colleges: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, created_at FROM colleges ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        let departments: Vec<(i64, String, i64, i64)> = sqlx::query_as(
            "SELECT id, name, college_id, created_at FROM departments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let subjects: Vec<(i64, String, i64, i64)> = sqlx::query_as(
            "SELECT id, name, department_id, created_at FROM subjects ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        info!(
            colleges = colleges.len(),
            departments = departments.len(),
            subjects = subjects.len(),
            "Migrating academic hierarchy"
        );

        let mut resolver = Resolver::new(self.policy);

        for (id, name, created_at) in colleges {
            let doc = CollegeDoc {
                name,
                relational_id: Some(id),
                created_at: unix_seconds(created_at),
            };
            let new_id = store.create(COLLEGES, &doc)?;
            remap.colleges.insert(id, new_id);
        }

        for (id, name, college_id, created_at) in departments {
            let college_id =
                resolver.resolve(&remap.colleges, Some(college_id), "department", id, "collegeId")?;
            let doc = DepartmentDoc {
                name,
                college_id,
                relational_id: Some(id),
                created_at: unix_seconds(created_at),
            };
            let new_id = store.create(DEPARTMENTS, &doc)?;
            remap.departments.insert(id, new_id);
        }

        for (id, name, department_id, created_at) in subjects {
            let department_id = resolver.resolve(
                &remap.departments,
                Some(department_id),
                "subject",
                id,
                "departmentId",
            )?;
            let doc = SubjectDoc {
                name,
                department_id,
                relational_id: Some(id),
                created_at: unix_seconds(created_at),
            };
            let new_id = store.create(SUBJECTS, &doc)?;
            remap.subjects.insert(id, new_id);
        }
        remap.academic_filled();

        Ok(AcademicReport {
            skipped: false,
            college_ids: remap.colleges.clone(),
            department_ids: remap.departments.clone(),
            subject_ids: remap.subjects.clone(),
            dropped_references: resolver.dropped(),
        })
    }
}

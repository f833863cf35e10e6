use crate::model::{College, Department, Subject};
use crate::persistence::traits::{AcademicRepository, SUBJECT_SEARCH_LIMIT};
use crate::persistence::{now_timestamp, PersistenceError};

use super::schema::{CollegeDoc, DepartmentDoc, SubjectDoc, COLLEGES, DEPARTMENTS, SUBJECTS};
use super::{DocumentRepository, Query};

impl AcademicRepository for DocumentRepository {
    async fn list_colleges(&self) -> Result<Vec<College>, PersistenceError> {
        let mut colleges: Vec<College> = self
            .store
            .all::<CollegeDoc>(COLLEGES)?
            .into_iter()
            .map(College::from)
            .collect();
        colleges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(colleges)
    }

    async fn list_departments(&self, college_id: &str) -> Result<Vec<Department>, PersistenceError> {
        let mut departments: Vec<Department> = self
            .store
            .find::<DepartmentDoc>(DEPARTMENTS, &Query::new().eq("collegeId", college_id))?
            .into_iter()
            .map(Department::from)
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn list_subjects(&self, department_id: &str) -> Result<Vec<Subject>, PersistenceError> {
        let mut subjects: Vec<Subject> = self
            .store
            .find::<SubjectDoc>(SUBJECTS, &Query::new().eq("departmentId", department_id))?
            .into_iter()
            .map(Subject::from)
            .collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    async fn search_subjects(
        &self,
        query: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Subject>, PersistenceError> {
        let needle = query.trim().to_lowercase();
        let filter = match department_id {
            Some(dept) => Query::new().eq("departmentId", dept),
            None => Query::new(),
        };
        let mut hits: Vec<Subject> = self
            .store
            .find::<SubjectDoc>(SUBJECTS, &filter)?
            .into_iter()
            .map(Subject::from)
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.truncate(SUBJECT_SEARCH_LIMIT);
        Ok(hits)
    }

    async fn create_college(&self, name: &str) -> Result<College, PersistenceError> {
        let existing = self
            .store
            .find::<CollegeDoc>(COLLEGES, &Query::new().eq("name", name))?;
        if !existing.is_empty() {
            return Err(PersistenceError::Conflict(format!("college {name:?} already exists")));
        }
        let doc = CollegeDoc {
            name: name.to_string(),
            relational_id: None,
            created_at: now_timestamp(),
        };
        let id = self.store.create(COLLEGES, &doc)?;
        Ok(College {
            id,
            name: doc.name,
        })
    }

    async fn create_department(
        &self,
        name: &str,
        college_id: &str,
    ) -> Result<Department, PersistenceError> {
        if self.store.get::<CollegeDoc>(COLLEGES, college_id)?.is_none() {
            return Err(PersistenceError::NotFound(format!("college {college_id}")));
        }
        let existing = self.store.find::<DepartmentDoc>(
            DEPARTMENTS,
            &Query::new().eq("collegeId", college_id).eq("name", name),
        )?;
        if !existing.is_empty() {
            return Err(PersistenceError::Conflict(format!(
                "department {name:?} already exists in college {college_id}"
            )));
        }
        let doc = DepartmentDoc {
            name: name.to_string(),
            college_id: Some(college_id.to_string()),
            relational_id: None,
            created_at: now_timestamp(),
        };
        let id = self.store.create(DEPARTMENTS, &doc)?;
        Ok(Department {
            id,
            name: doc.name,
            college_id: college_id.to_string(),
        })
    }

    async fn create_subject(
        &self,
        name: &str,
        department_id: &str,
    ) -> Result<Subject, PersistenceError> {
        if self
            .store
            .get::<DepartmentDoc>(DEPARTMENTS, department_id)?
            .is_none()
        {
            return Err(PersistenceError::NotFound(format!("department {department_id}")));
        }
        let existing = self.store.find::<SubjectDoc>(
            SUBJECTS,
            &Query::new().eq("departmentId", department_id).eq("name", name),
        )?;
        if !existing.is_empty() {
            return Err(PersistenceError::Conflict(format!(
                "subject {name:?} already exists in department {department_id}"
            )));
        }
        let doc = SubjectDoc {
            name: name.to_string(),
            department_id: Some(department_id.to_string()),
            relational_id: None,
            created_at: now_timestamp(),
        };
        let id = self.store.create(SUBJECTS, &doc)?;
        Ok(Subject {
            id,
            name: doc.name,
            department_id: department_id.to_string(),
        })
    }
}

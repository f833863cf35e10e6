use serde_json::{Map, Value};

use crate::model::{NewUser, ProfileUpdate, User};
use crate::persistence::traits::UserRepository;
use crate::persistence::PersistenceError;

use super::schema::{UserDoc, USERS};
use super::{DocumentRepository, Query};

impl UserRepository for DocumentRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User, PersistenceError> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(PersistenceError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let doc = UserDoc {
            email: user.email.clone(),
            name: user.name.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            college_id: user.affiliation.college_id.clone(),
            department_id: user.affiliation.department_id.clone(),
            education_year: user.affiliation.education_year,
            semester: user.affiliation.semester,
            created_at: user.created_at,
        };
        let id = self.store.create(USERS, &doc)?;
        Ok(User {
            id,
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            affiliation: user.affiliation.clone(),
            created_at: user.created_at,
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PersistenceError> {
        let found = self
            .store
            .find::<UserDoc>(USERS, &Query::new().eq("email", email))?;
        Ok(found.into_iter().next().map(User::from))
    }

    async fn load_user(&self, id: &str) -> Result<Option<User>, PersistenceError> {
        Ok(self.store.get::<UserDoc>(USERS, id)?.map(User::from))
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<User, PersistenceError> {
        let a = &update.affiliation;
        let mut patch = Map::new();
        patch.insert("name".into(), Value::from(update.name.clone()));
        patch.insert("collegeId".into(), Value::from(a.college_id.clone()));
        patch.insert("departmentId".into(), Value::from(a.department_id.clone()));
        patch.insert("educationYear".into(), Value::from(a.education_year));
        patch.insert("semester".into(), Value::from(a.semester));

        if !self.store.update(USERS, id, patch)? {
            return Err(PersistenceError::NotFound(format!("user {id}")));
        }
        self.load_user(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("user {id}")))
    }
}

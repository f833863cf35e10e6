//! Backend-agnostic domain records.
//!
//! Identifiers cross this layer as strings: the relational backend formats its
//! integer keys, the document backend hands out opaque document IDs. Nothing in
//! here knows which backend produced a value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix of storage pointers that refer to the local uploads directory.
pub const LOCAL_UPLOAD_PREFIX: &str = "/uploads/";

/// Maximum comment length, in characters, after trimming.
pub const MAX_COMMENT_LEN: usize = 500;

pub const MAX_EDUCATION_YEAR: u8 = 4;
pub const MAX_SEMESTER: u8 = 8;

/// Number of entries kept in a user's recent-activity feed.
pub const ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Educator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Educator => "educator",
        }
    }

    /// Unknown roles decode as `Student`, the registration default.
    pub fn parse(s: &str) -> Self {
        match s {
            "educator" => Role::Educator,
            _ => Role::Student,
        }
    }
}

/// Where a note's PDF currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    #[default]
    Local,
    #[serde(alias = "r2")]
    ObjectStore,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::ObjectStore => "object-store",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "object-store" | "r2" => StorageKind::ObjectStore,
            _ => StorageKind::Local,
        }
    }
}

/// Opaque file reference plus its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePointer {
    pub file_url: String,
    pub storage_kind: StorageKind,
}

impl StoragePointer {
    /// Pointer to a file stored under the local uploads directory.
    pub fn local(stored_file_name: &str) -> Self {
        Self {
            file_url: format!("{LOCAL_UPLOAD_PREFIX}{stored_file_name}"),
            storage_kind: StorageKind::Local,
        }
    }

    pub fn object_store(url: String) -> Self {
        Self {
            file_url: url,
            storage_kind: StorageKind::ObjectStore,
        }
    }

    /// File name inside the uploads directory, if this is a local `/uploads/` pointer.
    ///
    /// Only the final path component is returned so a crafted pointer can never
    /// escape the uploads directory.
    pub fn local_file_name(&self) -> Option<&str> {
        if self.storage_kind != StorageKind::Local {
            return None;
        }
        let rest = self.file_url.strip_prefix(LOCAL_UPLOAD_PREFIX)?;
        let name = rest.rsplit('/').next()?;
        if name.is_empty() || name == ".." || name == "." {
            None
        } else {
            Some(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct College {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub college_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub department_id: String,
}

/// College / department / year / semester a user or note is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    pub college_id: Option<String>,
    pub department_id: Option<String>,
    pub education_year: Option<u8>,
    pub semester: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(flatten)]
    pub affiliation: Affiliation,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub affiliation: Affiliation,
    pub created_at: u64,
}

/// Replacement values for the editable part of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub affiliation: Affiliation,
}

/// Identity of the authenticated caller, as handed over by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub role: Role,
    pub affiliation: Affiliation,
}

impl From<&User> for UserContext {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            affiliation: user.affiliation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    #[serde(flatten)]
    pub storage: StoragePointer,
    pub uploaded_by: String,
    #[serde(flatten)]
    pub affiliation: Affiliation,
    pub subject_ids: BTreeSet<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub storage: StoragePointer,
    pub uploaded_by: String,
    pub affiliation: Affiliation,
    pub subject_ids: BTreeSet<String>,
    pub created_at: u64,
}

/// Conjunction of optional filters; `subject_ids` matches notes carrying any of them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteFilter {
    pub college_id: Option<String>,
    pub department_id: Option<String>,
    pub education_year: Option<u8>,
    pub semester: Option<u8>,
    pub subject_ids: Vec<String>,
}

impl NoteFilter {
    /// Filter matching the caller's own academic affiliation.
    pub fn recommended_for(user: &UserContext) -> Self {
        Self {
            college_id: user.affiliation.college_id.clone(),
            department_id: user.affiliation.department_id.clone(),
            education_year: user.affiliation.education_year,
            semester: user.affiliation.semester,
            subject_ids: Vec::new(),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            want.as_ref().map_or(true, |w| have.as_ref() == Some(w))
        }

        eq(&self.college_id, &note.affiliation.college_id)
            && eq(&self.department_id, &note.affiliation.department_id)
            && eq(&self.education_year, &note.affiliation.education_year)
            && eq(&self.semester, &note.affiliation.semester)
            && (self.subject_ids.is_empty()
                || self.subject_ids.iter().any(|s| note.subject_ids.contains(s)))
    }
}

/// A note with its rating and comment aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    #[serde(flatten)]
    pub note: Note,
    pub average_rating: f64,
    pub rating_count: u64,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDetail {
    #[serde(flatten)]
    pub summary: NoteSummary,
    /// Sorted by name.
    pub subjects: Vec<Subject>,
    /// Newest first.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub note_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub value: u8,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Upload,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub date: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_notes: u64,
    pub user_uploads: u64,
    pub user_favorites: u64,
    pub user_comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub stats: UserStats,
    pub activity: Vec<ActivityEntry>,
}

/// Arithmetic mean of the rating values, `0.0` when there are none.
pub fn average_rating(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u64 = values.iter().map(|v| u64::from(*v)).sum();
    sum as f64 / values.len() as f64
}

/// Keep the newest [`ACTIVITY_LIMIT`] entries, newest first.
pub fn latest_activity(mut entries: Vec<ActivityEntry>) -> Vec<ActivityEntry> {
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(ACTIVITY_LIMIT);
    entries
}

/// Title shown in the activity feed for a comment on `note_title`.
pub fn comment_activity_title(note_title: &str) -> String {
    format!("Comment on: {note_title}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_with(college: Option<&str>, year: Option<u8>, subjects: &[&str]) -> Note {
        Note {
            id: "n1".to_string(),
            title: "Thermodynamics".to_string(),
            description: None,
            file_name: "thermo.pdf".to_string(),
            storage: StoragePointer::local("1700000000-1.pdf"),
            uploaded_by: "1".to_string(),
            affiliation: Affiliation {
                college_id: college.map(str::to_string),
                department_id: None,
                education_year: year,
                semester: None,
            },
            subject_ids: subjects.iter().map(|s| s.to_string()).collect(),
            created_at: 100,
        }
    }

    #[test]
    fn average_of_three_ratings_is_exact() {
        assert_eq!(average_rating(&[3, 5, 4]), 4.0);
    }

    #[test]
    fn average_of_no_ratings_is_zero() {
        assert_eq!(average_rating(&[]), 0.0);
    }

    #[test]
    fn local_file_name_strips_prefix() {
        let pointer = StoragePointer::local("1700000000-42.pdf");
        assert_eq!(pointer.file_url, "/uploads/1700000000-42.pdf");
        assert_eq!(pointer.local_file_name(), Some("1700000000-42.pdf"));
    }

    #[test]
    fn local_file_name_rejects_traversal_and_remote() {
        let sneaky = StoragePointer {
            file_url: "/uploads/../secret".to_string(),
            storage_kind: StorageKind::Local,
        };
        assert_eq!(sneaky.local_file_name(), Some("secret"));

        let dotdot = StoragePointer {
            file_url: "/uploads/..".to_string(),
            storage_kind: StorageKind::Local,
        };
        assert_eq!(dotdot.local_file_name(), None);

        let remote = StoragePointer::object_store("https://cdn.example/pdfs/a.pdf".to_string());
        assert_eq!(remote.local_file_name(), None);
    }

    #[test]
    fn storage_kind_parses_legacy_tag() {
        assert_eq!(StorageKind::parse("r2"), StorageKind::ObjectStore);
        assert_eq!(StorageKind::parse("object-store"), StorageKind::ObjectStore);
        assert_eq!(StorageKind::parse("local"), StorageKind::Local);
    }

    #[test]
    fn filter_matches_any_subject() {
        let note = note_with(Some("c1"), Some(2), &["s1", "s2"]);
        let filter = NoteFilter {
            subject_ids: vec!["s9".to_string(), "s2".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&note));

        let miss = NoteFilter {
            subject_ids: vec!["s9".to_string()],
            ..Default::default()
        };
        assert!(!miss.matches(&note));
    }

    #[test]
    fn filter_requires_every_set_field() {
        let note = note_with(Some("c1"), Some(2), &[]);
        let filter = NoteFilter {
            college_id: Some("c1".to_string()),
            education_year: Some(3),
            ..Default::default()
        };
        assert!(!filter.matches(&note));
        assert!(NoteFilter::default().matches(&note));
    }

    #[test]
    fn recommended_filter_copies_affiliation() {
        let ctx = UserContext {
            id: "7".to_string(),
            role: Role::Student,
            affiliation: Affiliation {
                college_id: Some("c1".to_string()),
                department_id: Some("d1".to_string()),
                education_year: Some(2),
                semester: Some(3),
            },
        };
        let filter = NoteFilter::recommended_for(&ctx);
        assert_eq!(filter.college_id.as_deref(), Some("c1"));
        assert_eq!(filter.semester, Some(3));
        assert!(filter.subject_ids.is_empty());
    }

    #[test]
    fn latest_activity_sorts_and_truncates() {
        let entries = (0..15)
            .map(|i| ActivityEntry {
                kind: ActivityKind::Upload,
                title: format!("n{i}"),
                date: i,
            })
            .collect();
        let latest = latest_activity(entries);
        assert_eq!(latest.len(), ACTIVITY_LIMIT);
        assert_eq!(latest[0].date, 14);
        assert_eq!(latest[9].date, 5);
    }
}

//! Runs the same scenarios against both backends and compares the results.
//!
//! IDs differ between backends, so comparisons go through projections that
//! only keep titles, names, counts and aggregates.

use std::collections::BTreeSet;

use super::{Database, SqliteRepository};
use crate::model::{
    ActivityKind, Affiliation, NewComment, NewNote, NewUser, NoteFilter, NoteSummary,
    ProfileUpdate, Role, StorageKind, StoragePointer,
};
use crate::persistence::document::{DocumentRepository, DocumentStore};
use crate::persistence::traits::{
    AcademicRepository, InteractionRepository, NoteRepository, UserRepository,
};
use crate::persistence::PersistenceError;

trait AllRepos: AcademicRepository + UserRepository + NoteRepository + InteractionRepository {}
impl<T: AcademicRepository + UserRepository + NoteRepository + InteractionRepository> AllRepos for T {}

struct Fixture {
    college: String,
    other_college: String,
    department: String,
    algebra: String,
    calculus: String,
    alice: String,
    bob: String,
    notes: Vec<String>,
}

async fn sqlite_repo() -> SqliteRepository {
    let db = Database::new_in_memory().await.unwrap();
    SqliteRepository::new(db.pool().clone())
}

fn document_repo() -> (tempfile::TempDir, DocumentRepository) {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::open(dir.path().join("docs")).unwrap();
    (dir, DocumentRepository::new(store))
}

fn new_user(email: &str, name: &str, college: &str, created_at: u64) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: name.to_string(),
        password_hash: "$2b$10$hash".to_string(),
        role: Role::Student,
        affiliation: Affiliation {
            college_id: Some(college.to_string()),
            department_id: None,
            education_year: Some(2),
            semester: Some(3),
        },
        created_at,
    }
}

fn new_note(title: &str, by: &str, college: &str, subjects: &[&String], created_at: u64) -> NewNote {
    NewNote {
        title: title.to_string(),
        description: Some(format!("{title} lecture notes")),
        file_name: format!("{title}.pdf"),
        storage: StoragePointer::local(&format!("{created_at}-{title}.pdf")),
        uploaded_by: by.to_string(),
        affiliation: Affiliation {
            college_id: Some(college.to_string()),
            department_id: None,
            education_year: Some(2),
            semester: Some(3),
        },
        subject_ids: subjects.iter().map(|s| s.to_string()).collect(),
        created_at,
    }
}

async fn seed<R: AllRepos>(repo: &R) -> Fixture {
    let college = repo.create_college("Engineering").await.unwrap().id;
    let other_college = repo.create_college("Arts").await.unwrap().id;
    let department = repo
        .create_department("Mathematics", &college)
        .await
        .unwrap()
        .id;
    let algebra = repo.create_subject("Algebra", &department).await.unwrap().id;
    let calculus = repo.create_subject("Calculus", &department).await.unwrap().id;

    let alice = repo
        .create_user(&new_user("alice@example.com", "Alice", &college, 10))
        .await
        .unwrap()
        .id;
    let bob = repo
        .create_user(&new_user("bob@example.com", "Bob", &college, 11))
        .await
        .unwrap()
        .id;

    let mut notes = Vec::new();
    for (title, by, college_id, subjects, ts) in [
        ("Groups", &alice, &college, vec![&algebra], 100),
        ("Limits", &alice, &college, vec![&calculus], 200),
        ("Rings", &bob, &college, vec![&algebra, &calculus], 300),
        ("Poetry", &bob, &other_college, vec![], 400),
    ] {
        let note = repo
            .create_note(&new_note(title, by, college_id, &subjects, ts))
            .await
            .unwrap();
        notes.push(note.id);
    }

    repo.upsert_rating(&notes[0], &alice, 3).await.unwrap();
    repo.upsert_rating(&notes[0], &bob, 5).await.unwrap();
    repo.add_comment(&NewComment {
        note_id: notes[0].clone(),
        user_id: bob.clone(),
        text: "Clear proofs".to_string(),
        created_at: 500,
    })
    .await
    .unwrap();
    repo.add_comment(&NewComment {
        note_id: notes[0].clone(),
        user_id: alice.clone(),
        text: "Thanks!".to_string(),
        created_at: 600,
    })
    .await
    .unwrap();

    Fixture {
        college,
        other_college,
        department,
        algebra,
        calculus,
        alice,
        bob,
        notes,
    }
}

fn project(summaries: &[NoteSummary]) -> Vec<(String, f64, u64, u64)> {
    summaries
        .iter()
        .map(|s| {
            (
                s.note.title.clone(),
                s.average_rating,
                s.rating_count,
                s.comment_count,
            )
        })
        .collect()
}

async fn listing_scenario<R: AllRepos>(repo: &R) -> Vec<Vec<(String, f64, u64, u64)>> {
    let f = seed(repo).await;
    let mut out = Vec::new();
    out.push(project(&repo.list_notes(&NoteFilter::default()).await.unwrap()));
    out.push(project(
        &repo
            .list_notes(&NoteFilter {
                college_id: Some(f.college.clone()),
                ..Default::default()
            })
            .await
            .unwrap(),
    ));
    out.push(project(
        &repo
            .list_notes(&NoteFilter {
                subject_ids: vec![f.algebra.clone()],
                ..Default::default()
            })
            .await
            .unwrap(),
    ));
    out.push(project(
        &repo
            .list_notes(&NoteFilter {
                college_id: Some(f.college.clone()),
                department_id: None,
                education_year: Some(2),
                semester: Some(3),
                subject_ids: vec![f.calculus.clone(), "unknown".to_string()],
            })
            .await
            .unwrap(),
    ));
    out.push(project(
        &repo
            .list_notes(&NoteFilter {
                college_id: Some(f.other_college.clone()),
                semester: Some(1),
                ..Default::default()
            })
            .await
            .unwrap(),
    ));
    out.push(project(&repo.list_uploads(&f.alice).await.unwrap()));
    out
}

#[tokio::test]
async fn test_listings_agree_across_backends() {
    let sqlite = sqlite_repo().await;
    let (_dir, document) = document_repo();

    let relational = listing_scenario(&sqlite).await;
    let documents = listing_scenario(&document).await;
    assert_eq!(relational, documents);

    let titles: Vec<&str> = relational[0].iter().map(|r| r.0.as_str()).collect();
    assert_eq!(titles, ["Poetry", "Rings", "Limits", "Groups"]);
    assert_eq!(relational[0][3], ("Groups".to_string(), 4.0, 2, 2));
    assert_eq!(relational[0][0].1, 0.0);

    let algebra: Vec<&str> = relational[2].iter().map(|r| r.0.as_str()).collect();
    assert_eq!(algebra, ["Rings", "Groups"]);
    let calculus: Vec<&str> = relational[3].iter().map(|r| r.0.as_str()).collect();
    assert_eq!(calculus, ["Rings", "Limits"]);
    assert!(relational[4].is_empty());
    assert_eq!(relational[5].len(), 2);
}

async fn detail_scenario<R: AllRepos>(repo: &R) {
    let f = seed(repo).await;
    let detail = repo.load_note(&f.notes[2]).await.unwrap().unwrap();
    let subjects: Vec<&str> = detail.subjects.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(subjects, ["Algebra", "Calculus"]);
    assert_eq!(
        detail.summary.note.subject_ids,
        BTreeSet::from([f.algebra.clone(), f.calculus.clone()])
    );

    let groups = repo.load_note(&f.notes[0]).await.unwrap().unwrap();
    let comments: Vec<&str> = groups.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(comments, ["Thanks!", "Clear proofs"]);
    assert_eq!(groups.summary.average_rating, 4.0);
    assert_eq!(groups.summary.note.storage.storage_kind, StorageKind::Local);

    assert!(repo.load_note("999999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_note_detail_sqlite() {
    detail_scenario(&sqlite_repo().await).await;
}

#[tokio::test]
async fn test_note_detail_document() {
    let (_dir, repo) = document_repo();
    detail_scenario(&repo).await;
}

async fn rating_scenario<R: AllRepos>(repo: &R) {
    let f = seed(repo).await;
    repo.upsert_rating(&f.notes[1], &f.alice, 2).await.unwrap();
    let first = repo.upsert_rating(&f.notes[1], &f.alice, 5).await.unwrap();
    assert_eq!(first.value, 5);

    let detail = repo.load_note(&f.notes[1]).await.unwrap().unwrap();
    assert_eq!(detail.summary.rating_count, 1);
    assert_eq!(detail.summary.average_rating, 5.0);

    assert!(matches!(
        repo.upsert_rating(&f.notes[1], &f.alice, 0).await,
        Err(PersistenceError::Invalid(_))
    ));
    assert!(matches!(
        repo.upsert_rating(&f.notes[1], &f.alice, 6).await,
        Err(PersistenceError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_rating_upsert_sqlite() {
    rating_scenario(&sqlite_repo().await).await;
}

#[tokio::test]
async fn test_rating_upsert_document() {
    let (_dir, repo) = document_repo();
    rating_scenario(&repo).await;
}

async fn favorite_scenario<R: AllRepos>(repo: &R) {
    let f = seed(repo).await;
    assert!(repo.toggle_favorite(&f.bob, &f.notes[0]).await.unwrap());
    assert_eq!(repo.list_favorites(&f.bob).await.unwrap().len(), 1);
    assert!(!repo.toggle_favorite(&f.bob, &f.notes[0]).await.unwrap());
    assert!(repo.list_favorites(&f.bob).await.unwrap().is_empty());
    assert!(repo.toggle_favorite(&f.bob, &f.notes[0]).await.unwrap());
    assert!(repo.toggle_favorite(&f.bob, &f.notes[3]).await.unwrap());

    let favorites: Vec<String> = repo
        .list_favorites(&f.bob)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.note.title)
        .collect();
    assert_eq!(favorites, ["Poetry", "Groups"]);
}

#[tokio::test]
async fn test_favorite_toggle_sqlite() {
    favorite_scenario(&sqlite_repo().await).await;
}

#[tokio::test]
async fn test_favorite_toggle_document() {
    let (_dir, repo) = document_repo();
    favorite_scenario(&repo).await;
}

async fn constraint_scenario<R: AllRepos>(repo: &R) {
    let f = seed(repo).await;
    assert!(matches!(
        repo.create_college("Engineering").await,
        Err(PersistenceError::Conflict(_))
    ));
    assert!(matches!(
        repo.create_department("Mathematics", &f.college).await,
        Err(PersistenceError::Conflict(_))
    ));
    // Same name under another parent is fine.
    repo.create_department("Mathematics", &f.other_college)
        .await
        .unwrap();
    assert!(matches!(
        repo.create_department("Physics", "424242").await,
        Err(PersistenceError::NotFound(_))
    ));
    assert!(matches!(
        repo.create_subject("Topology", "424242").await,
        Err(PersistenceError::NotFound(_))
    ));
    assert!(matches!(
        repo.create_user(&new_user("alice@example.com", "Alice 2", &f.college, 12))
            .await,
        Err(PersistenceError::Conflict(_))
    ));
    assert!(matches!(
        repo.add_comment(&NewComment {
            note_id: f.notes[0].clone(),
            user_id: f.bob.clone(),
            text: "   ".to_string(),
            created_at: 1,
        })
        .await,
        Err(PersistenceError::Invalid(_))
    ));
    assert!(matches!(
        repo.add_comment(&NewComment {
            note_id: "424242".to_string(),
            user_id: f.bob.clone(),
            text: "Lost".to_string(),
            created_at: 1,
        })
        .await,
        Err(PersistenceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_constraints_sqlite() {
    constraint_scenario(&sqlite_repo().await).await;
}

#[tokio::test]
async fn test_constraints_document() {
    let (_dir, repo) = document_repo();
    constraint_scenario(&repo).await;
}

async fn academic_scenario<R: AllRepos>(repo: &R) -> (Vec<String>, Vec<String>, Vec<String>) {
    let f = seed(repo).await;
    let colleges = repo
        .list_colleges()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    let subjects = repo
        .list_subjects(&f.department)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    let search = repo
        .search_subjects("CALC", None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    (colleges, subjects, search)
}

#[tokio::test]
async fn test_academic_listings_agree() {
    let sqlite = sqlite_repo().await;
    let (_dir, document) = document_repo();
    let relational = academic_scenario(&sqlite).await;
    assert_eq!(relational, academic_scenario(&document).await);
    assert_eq!(relational.0, ["Arts", "Engineering"]);
    assert_eq!(relational.1, ["Algebra", "Calculus"]);
    assert_eq!(relational.2, ["Calculus"]);
}

type ProfileOutcome = (
    String,
    Option<u8>,
    (u64, u64, u64, u64),
    Vec<(ActivityKind, String, u64)>,
);

async fn profile_and_analytics<R: AllRepos>(repo: &R) -> ProfileOutcome {
    let f = seed(repo).await;
    let updated = repo
        .update_profile(
            &f.alice,
            &ProfileUpdate {
                name: "Alice Smith".to_string(),
                affiliation: Affiliation {
                    college_id: Some(f.college.clone()),
                    department_id: Some(f.department.clone()),
                    education_year: Some(3),
                    semester: Some(5),
                },
            },
        )
        .await
        .unwrap();
    let by_email = repo
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, f.alice);
    assert_eq!(by_email.name, "Alice Smith");

    repo.toggle_favorite(&f.alice, &f.notes[2]).await.unwrap();
    let analytics = repo.user_analytics(&f.alice).await.unwrap();
    let s = analytics.stats;
    (
        updated.name,
        updated.affiliation.education_year,
        (s.total_notes, s.user_uploads, s.user_favorites, s.user_comments),
        analytics
            .activity
            .into_iter()
            .map(|a| (a.kind, a.title, a.date))
            .collect(),
    )
}

#[tokio::test]
async fn test_profile_and_analytics_agree() {
    let sqlite = sqlite_repo().await;
    let (_dir, document) = document_repo();
    let relational = profile_and_analytics(&sqlite).await;
    assert_eq!(relational, profile_and_analytics(&document).await);

    assert_eq!(relational.0, "Alice Smith");
    assert_eq!(relational.1, Some(3));
    assert_eq!(relational.2, (4, 2, 1, 1));
    assert_eq!(
        relational.3,
        vec![
            (ActivityKind::Comment, "Comment on: Groups".to_string(), 600),
            (ActivityKind::Upload, "Limits".to_string(), 200),
            (ActivityKind::Upload, "Groups".to_string(), 100),
        ]
    );
}

#[tokio::test]
async fn test_update_storage_switches_pointer() {
    let sqlite = sqlite_repo().await;
    let f = seed(&sqlite).await;
    let pointer = StoragePointer::object_store("https://cdn.example/pdfs/x.pdf".to_string());
    sqlite.update_storage(&f.notes[0], &pointer).await.unwrap();
    let detail = sqlite.load_note(&f.notes[0]).await.unwrap().unwrap();
    assert_eq!(detail.summary.note.storage, pointer);
    assert!(matches!(
        sqlite.update_storage("999", &pointer).await,
        Err(PersistenceError::NotFound(_))
    ));
}

/// Six notes and three comments, all stamped within the same second.
async fn same_second_order(repo: &impl AllRepos) -> (Vec<String>, Vec<String>) {
    let college = repo.create_college("Engineering").await.unwrap().id;
    let user = repo
        .create_user(&new_user("ada@example.com", "Ada", &college, 1))
        .await
        .unwrap()
        .id;
    let mut first = None;
    for i in 1..=6 {
        let note = repo
            .create_note(&new_note(&format!("n{i}"), &user, &college, &[], 100))
            .await
            .unwrap();
        first.get_or_insert(note.id);
    }
    let first = first.unwrap();
    for i in 1..=3 {
        repo.add_comment(&NewComment {
            note_id: first.clone(),
            user_id: user.clone(),
            text: format!("c{i}"),
            created_at: 500,
        })
        .await
        .unwrap();
    }

    let titles = repo
        .list_notes(&NoteFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.note.title)
        .collect();
    let comments = repo
        .load_note(&first)
        .await
        .unwrap()
        .unwrap()
        .comments
        .into_iter()
        .map(|c| c.text)
        .collect();
    (titles, comments)
}

#[tokio::test]
async fn test_same_second_ties_sort_alike() {
    let sqlite = same_second_order(&sqlite_repo().await).await;
    let (_dir, document) = document_repo();
    let document = same_second_order(&document).await;

    assert_eq!(sqlite.0, ["n6", "n5", "n4", "n3", "n2", "n1"]);
    assert_eq!(sqlite.1, ["c3", "c2", "c1"]);
    assert_eq!(sqlite, document);
}

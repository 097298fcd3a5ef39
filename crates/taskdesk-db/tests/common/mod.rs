// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use taskdesk_core::task::{CreateTask, TaskStatus, UpdateTask};
use taskdesk_core::user::{CreateUser, User};
use taskdesk_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn make_user(db: &dyn Database, email: &str) -> User {
    db.create_user(&CreateUser {
        name: "Test User".into(),
        email: email.into(),
        password_hash: "$argon2id$v=19$stub".into(),
    })
    .await
    .unwrap()
}

fn make_task(user_id: &str, title: &str) -> CreateTask {
    CreateTask {
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: None,
        status: TaskStatus::Pending,
        deadline: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        attachment_path: None,
    }
}

fn update_of(title: &str, attachment_path: Option<&str>) -> UpdateTask {
    UpdateTask {
        title: title.to_string(),
        description: Some("updated".into()),
        status: TaskStatus::InProgress,
        deadline: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        attachment_path: attachment_path.map(String::from),
    }
}

// ---------------------------------------------------------------------------
// User tests
// ---------------------------------------------------------------------------

/// Create, fetch by id, look up credentials by email, reject duplicates.
pub async fn test_user_crud(db: &dyn Database) {
    let user = make_user(db, "a@x.com").await;
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.name, "Test User");

    let fetched = db.get_user(&user.id).await.unwrap();
    assert_eq!(fetched.id, user.id);

    let creds = db.find_user_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(creds.user.id, user.id);
    assert_eq!(creds.password_hash, "$argon2id$v=19$stub");

    assert!(db.find_user_by_email("nobody@x.com").await.unwrap().is_none());

    let dup = db
        .create_user(&CreateUser {
            name: "Other".into(),
            email: "a@x.com".into(),
            password_hash: "h".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(dup, DbError::Conflict(_)), "got {dup:?}");

    let missing = db.get_user("no-such-user").await.unwrap_err();
    assert!(matches!(missing, DbError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Task tests
// ---------------------------------------------------------------------------

/// Basic task CRUD: create, get, update, delete.
pub async fn test_task_crud(db: &dyn Database) {
    let user = make_user(db, "crud@x.com").await;

    let mut input = make_task(&user.id, "Task 1");
    input.description = Some("do something".into());
    let task = db.create_task(&input).await.unwrap();
    assert_eq!(task.user_id, user.id);
    assert_eq!(task.title, "Task 1");
    assert_eq!(task.description.as_deref(), Some("do something"));
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.deadline, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert!(task.attachment_path.is_none());

    let fetched = db.get_task(&task.id).await.unwrap();
    assert_eq!(fetched, task);

    let updated = db.update_task(&task.id, &update_of("Renamed", None)).await.unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.status, TaskStatus::InProgress);
    assert_eq!(updated.deadline, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    // owner never changes
    assert_eq!(updated.user_id, user.id);
    assert!(updated.updated_at >= task.updated_at);

    db.delete_task(&task.id).await.unwrap();
    assert!(matches!(
        db.get_task(&task.id).await.unwrap_err(),
        DbError::NotFound(_)
    ));
    assert!(matches!(
        db.delete_task(&task.id).await.unwrap_err(),
        DbError::NotFound(_)
    ));
    assert!(matches!(
        db.update_task(&task.id, &update_of("x", None)).await.unwrap_err(),
        DbError::NotFound(_)
    ));
}

/// Listing returns only the requested user's tasks, oldest first.
pub async fn test_list_tasks_scoped_to_owner(db: &dyn Database) {
    let alice = make_user(db, "alice@x.com").await;
    let bob = make_user(db, "bob@x.com").await;

    let a1 = db.create_task(&make_task(&alice.id, "a1")).await.unwrap();
    let a2 = db.create_task(&make_task(&alice.id, "a2")).await.unwrap();
    db.create_task(&make_task(&bob.id, "b1")).await.unwrap();

    let alice_tasks = db.list_tasks_for_user(&alice.id).await.unwrap();
    let ids: Vec<_> = alice_tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, [a1.id.as_str(), a2.id.as_str()]);

    let bob_tasks = db.list_tasks_for_user(&bob.id).await.unwrap();
    assert_eq!(bob_tasks.len(), 1);
    assert_eq!(bob_tasks[0].title, "b1");

    assert!(db.list_tasks_for_user("nobody").await.unwrap().is_empty());
}

/// `attachment_path: None` on update keeps the stored reference; `Some` replaces it.
pub async fn test_attachment_path_update_semantics(db: &dyn Database) {
    let user = make_user(db, "files@x.com").await;
    let mut input = make_task(&user.id, "with file");
    input.attachment_path = Some("private/one.pdf".into());
    let task = db.create_task(&input).await.unwrap();
    assert_eq!(task.attachment_path.as_deref(), Some("private/one.pdf"));

    let kept = db.update_task(&task.id, &update_of("kept", None)).await.unwrap();
    assert_eq!(kept.attachment_path.as_deref(), Some("private/one.pdf"));

    let replaced = db
        .update_task(&task.id, &update_of("replaced", Some("private/two.pdf")))
        .await
        .unwrap();
    assert_eq!(replaced.attachment_path.as_deref(), Some("private/two.pdf"));

    db.create_task(&make_task(&user.id, "no file")).await.unwrap();
    let paths = db.list_attachment_paths().await.unwrap();
    assert_eq!(paths, ["private/two.pdf"]);
}

/// A task must reference an existing user.
pub async fn test_task_requires_existing_owner(db: &dyn Database) {
    let err = db.create_task(&make_task("ghost", "orphan")).await.unwrap_err();
    assert!(matches!(err, DbError::Internal(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Revoked token tests
// ---------------------------------------------------------------------------

/// Revocation is idempotent and expired entries are purged.
pub async fn test_token_revocation(db: &dyn Database) {
    let now = Utc::now();
    assert!(!db.is_token_revoked("jti-1").await.unwrap());

    db.revoke_token("jti-1", now + Duration::hours(1)).await.unwrap();
    db.revoke_token("jti-1", now + Duration::hours(1)).await.unwrap();
    db.revoke_token("jti-old", now - Duration::hours(1)).await.unwrap();
    assert!(db.is_token_revoked("jti-1").await.unwrap());
    assert!(db.is_token_revoked("jti-old").await.unwrap());

    let removed = db.purge_expired_revocations(now).await.unwrap();
    assert_eq!(removed, 1);
    assert!(db.is_token_revoked("jti-1").await.unwrap());
    assert!(!db.is_token_revoked("jti-old").await.unwrap());
}

//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite
//! database. Tests are organized by module and functionality.

use taskdeck::db::Database;
use taskdeck::types::{HistoryFilter, NewTask, TaskFilter, TaskPatch, TaskStatus, User};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn make_user(db: &Database, username: &str) -> User {
    db.create_user(username, &format!("{}@test.org", username), "secret")
        .expect("Failed to create user")
}

fn make_task(db: &Database, user_id: i64, title: &str, priority: i32) -> i64 {
    db.create_task(
        user_id,
        NewTask {
            title: title.to_string(),
            priority,
            ..Default::default()
        },
    )
    .expect("Failed to create task")
    .id
}

fn priority_of(db: &Database, user_id: i64, task_id: i64) -> i32 {
    db.get_task(user_id, task_id)
        .unwrap()
        .expect("task should exist")
        .priority
}

#[test]
fn on_disk_database_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("taskdeck.db");

    {
        let db = Database::open(&path).unwrap();
        let user = make_user(&db, "alice");
        make_task(&db, user.id, "Task 1", 1);
    }

    let db = Database::open(&path).unwrap();
    let user = db.authenticate("alice", "secret").unwrap().unwrap();
    let tasks = db.list_tasks(user.id, &TaskFilter::default()).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Task 1");
}

mod user_tests {
    use super::*;

    #[test]
    fn create_user_and_authenticate() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        assert_eq!(user.username, "alice");

        let found = db.authenticate("alice", "secret").unwrap();
        assert_eq!(found.unwrap().id, user.id);

        assert!(db.authenticate("alice", "wrong").unwrap().is_none());
        assert!(db.authenticate("nobody", "secret").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = setup_db();
        make_user(&db, "alice");

        let result = db.create_user("alice", "other@test.org", "pw");
        assert!(result.is_err());
    }

    #[test]
    fn blank_username_rejected() {
        let db = setup_db();
        assert!(db.create_user("", "a@test.org", "pw").is_err());
        assert!(db.create_user("   ", "a@test.org", "pw").is_err());
    }

    #[test]
    fn session_round_trip() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        let token = db.create_session(user.id, 24).unwrap();
        let found = db.session_user(&token).unwrap();
        assert_eq!(found.unwrap().id, user.id);

        db.delete_session(&token).unwrap();
        assert!(db.session_user(&token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_dead() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        // Negative TTL puts the expiry in the past.
        let token = db.create_session(user.id, -1).unwrap();
        assert!(db.session_user(&token).unwrap().is_none());
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn create_and_get_task() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        let task = db
            .create_task(
                user.id,
                NewTask {
                    title: "Task 1".to_string(),
                    description: "This is task 1".to_string(),
                    priority: 1,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(task.title, "Task 1");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!task.completed);

        let found = db.get_task(user.id, task.id).unwrap().unwrap();
        assert_eq!(found.description, "This is task 1");
        assert_eq!(found.priority, 1);
    }

    #[test]
    fn blank_title_rejected() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        let result = db.create_task(
            user.id,
            NewTask {
                title: "  ".to_string(),
                priority: 1,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn foreign_task_reads_as_absent() {
        let db = setup_db();
        let alice = make_user(&db, "alice");
        let bob = make_user(&db, "bob");
        let task_id = make_task(&db, alice.id, "Task 1", 1);

        assert!(db.get_task(bob.id, task_id).unwrap().is_none());
        assert!(db.get_task(alice.id, task_id).unwrap().is_some());
    }

    #[test]
    fn list_tasks_with_filters() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        make_task(&db, user.id, "Buy milk", 1);
        let done_id = make_task(&db, user.id, "Wash car", 2);
        make_task(&db, user.id, "Buy stamps", 3);
        db.toggle_complete(user.id, done_id).unwrap();

        let all = db.list_tasks(user.id, &TaskFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        // Ordered by priority ascending.
        assert_eq!(all[0].title, "Buy milk");

        let by_title = db
            .list_tasks(
                user.id,
                &TaskFilter {
                    title: Some("buy".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_title.len(), 2);

        let completed = db
            .list_tasks(
                user.id,
                &TaskFilter {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].title, "Wash car");
    }

    #[test]
    fn toggle_complete_flips_and_ignores_foreign_tasks() {
        let db = setup_db();
        let alice = make_user(&db, "alice");
        let bob = make_user(&db, "bob");
        let task_id = make_task(&db, alice.id, "Task 1", 1);

        assert!(db.toggle_complete(alice.id, task_id).unwrap());
        assert!(db.get_task(alice.id, task_id).unwrap().unwrap().completed);

        // Bob toggling Alice's task has no effect.
        assert!(!db.toggle_complete(bob.id, task_id).unwrap());
        assert!(db.get_task(alice.id, task_id).unwrap().unwrap().completed);
    }

    #[test]
    fn soft_delete_hides_but_keeps_the_row() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        assert!(db.soft_delete_task(user.id, task_id).unwrap());
        assert!(db.get_task(user.id, task_id).unwrap().is_none());

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE id = ?1",
                    [task_id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 1);

        // A second soft delete finds nothing.
        assert!(!db.soft_delete_task(user.id, task_id).unwrap());
    }

    #[test]
    fn hard_delete_removes_the_row() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        assert!(db.delete_task(user.id, task_id).unwrap());
        assert!(db.get_task(user.id, task_id).unwrap().is_none());

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE id = ?1",
                    [task_id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 0);

        assert!(!db.delete_task(user.id, 999).unwrap());
    }

    #[test]
    fn task_counts_track_completion() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        make_task(&db, user.id, "Task 1", 1);
        let done_id = make_task(&db, user.id, "Task 2", 2);
        db.toggle_complete(user.id, done_id).unwrap();

        let counts = db.task_counts(user.id).unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.completed, 1);
    }
}

mod reconciliation_tests {
    use super::*;

    #[test]
    fn create_into_collision_shifts_contiguous_block() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let t1 = make_task(&db, user.id, "Task 1", 1);
        let t2 = make_task(&db, user.id, "Task 2", 2);
        let t3 = make_task(&db, user.id, "Task 3", 3);

        let t4 = make_task(&db, user.id, "Task 4", 1);

        assert_eq!(priority_of(&db, user.id, t4), 1);
        assert_eq!(priority_of(&db, user.id, t1), 2);
        assert_eq!(priority_of(&db, user.id, t2), 3);
        assert_eq!(priority_of(&db, user.id, t3), 4);
    }

    #[test]
    fn shift_stops_at_the_first_gap() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let t1 = make_task(&db, user.id, "Task 1", 1);
        let t2 = make_task(&db, user.id, "Task 2", 2);
        let t5 = make_task(&db, user.id, "Task 5", 5);

        make_task(&db, user.id, "New", 1);

        assert_eq!(priority_of(&db, user.id, t1), 2);
        assert_eq!(priority_of(&db, user.id, t2), 3);
        // Beyond the gap, untouched.
        assert_eq!(priority_of(&db, user.id, t5), 5);
    }

    #[test]
    fn update_to_lower_priority_shifts_only_forward_collisions() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let t1 = make_task(&db, user.id, "Task 1", 1);
        let t2 = make_task(&db, user.id, "Task 2", 2);
        let t3 = make_task(&db, user.id, "Task 3", 3);

        // Move task 2 into slot 1: task 1 shifts to 2, task 3 keeps its gap.
        db.update_task(
            user.id,
            t2,
            TaskPatch {
                priority: Some(1),
                ..Default::default()
            },
            false,
        )
        .unwrap()
        .unwrap();

        assert_eq!(priority_of(&db, user.id, t2), 1);
        assert_eq!(priority_of(&db, user.id, t1), 2);
        assert_eq!(priority_of(&db, user.id, t3), 3);
    }

    #[test]
    fn update_keeping_priority_is_a_no_op() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let t1 = make_task(&db, user.id, "Task 1", 1);
        let t2 = make_task(&db, user.id, "Task 2", 2);

        db.update_task(
            user.id,
            t1,
            TaskPatch {
                title: Some("Task 1".to_string()),
                description: Some("task 1 description".to_string()),
                priority: Some(1),
                ..Default::default()
            },
            false,
        )
        .unwrap()
        .unwrap();

        assert_eq!(priority_of(&db, user.id, t1), 1);
        assert_eq!(priority_of(&db, user.id, t2), 2);
        assert_eq!(
            db.get_task(user.id, t1).unwrap().unwrap().description,
            "task 1 description"
        );
    }

    #[test]
    fn no_duplicate_priorities_among_incomplete_tasks() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        for i in 1..=5 {
            make_task(&db, user.id, &format!("Task {}", i), i);
        }
        // Repeatedly slam new tasks into slot 1.
        for i in 6..=8 {
            make_task(&db, user.id, &format!("Task {}", i), 1);
        }

        let tasks = db.list_tasks(user.id, &TaskFilter::default()).unwrap();
        let mut priorities: Vec<i32> = tasks
            .iter()
            .filter(|t| !t.completed)
            .map(|t| t.priority)
            .collect();
        let len = priorities.len();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), len, "found duplicate priorities");
    }

    #[test]
    fn completed_and_deleted_tasks_are_not_shifted() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let done = make_task(&db, user.id, "Done", 1);
        db.toggle_complete(user.id, done).unwrap();
        let gone = make_task(&db, user.id, "Gone", 1);
        db.soft_delete_task(user.id, gone).unwrap();

        make_task(&db, user.id, "New", 1);

        assert_eq!(priority_of(&db, user.id, done), 1);
        let gone_priority: i32 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT priority FROM tasks WHERE id = ?1",
                    [gone],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(gone_priority, 1);
    }

    #[test]
    fn reconciliation_is_scoped_per_user() {
        let db = setup_db();
        let alice = make_user(&db, "alice");
        let bob = make_user(&db, "bob");
        let bobs = make_task(&db, bob.id, "Bob task", 1);

        make_task(&db, alice.id, "Alice task", 1);

        assert_eq!(priority_of(&db, bob.id, bobs), 1);
    }
}

mod history_tests {
    use super::*;

    #[test]
    fn api_status_change_appends_one_record() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        db.update_task(
            user.id,
            task_id,
            TaskPatch {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
            true,
        )
        .unwrap()
        .unwrap();

        let history = db.task_history(user.id, task_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].original_status, TaskStatus::Pending);
        assert_eq!(history[0].updated_status, TaskStatus::InProgress);

        db.update_task(
            user.id,
            task_id,
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            true,
        )
        .unwrap()
        .unwrap();

        let history = db.task_history(user.id, task_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].original_status, TaskStatus::InProgress);
        assert_eq!(history[1].updated_status, TaskStatus::Completed);
    }

    #[test]
    fn unchanged_status_writes_nothing() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        db.update_task(
            user.id,
            task_id,
            TaskPatch {
                status: Some(TaskStatus::Pending),
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
            true,
        )
        .unwrap()
        .unwrap();

        assert!(db.task_history(user.id, task_id).unwrap().is_empty());
    }

    #[test]
    fn form_path_never_writes_history() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        db.update_task(
            user.id,
            task_id,
            TaskPatch {
                status: Some(TaskStatus::Cancelled),
                ..Default::default()
            },
            false,
        )
        .unwrap()
        .unwrap();

        assert!(db.task_history(user.id, task_id).unwrap().is_empty());
    }

    #[test]
    fn account_history_filters() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let t1 = make_task(&db, user.id, "Task 1", 1);
        let t2 = make_task(&db, user.id, "Task 2", 2);

        for (task, status) in [
            (t1, TaskStatus::InProgress),
            (t1, TaskStatus::Completed),
            (t2, TaskStatus::Cancelled),
        ] {
            db.update_task(
                user.id,
                task,
                TaskPatch {
                    status: Some(status),
                    ..Default::default()
                },
                true,
            )
            .unwrap()
            .unwrap();
        }

        let all = db.list_history(user.id, &HistoryFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let cancelled = db
            .list_history(
                user.id,
                &HistoryFilter {
                    updated_status: Some(TaskStatus::Cancelled),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].task_id, t2);

        let from_in_progress = db
            .list_history(
                user.id,
                &HistoryFilter {
                    original_status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(from_in_progress.len(), 1);

        let future = db
            .list_history(
                user.id,
                &HistoryFilter {
                    changed_since: Some(i64::MAX),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(future.is_empty());
    }

    #[test]
    fn history_of_deleted_task_is_hidden() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        let task_id = make_task(&db, user.id, "Task 1", 1);

        db.update_task(
            user.id,
            task_id,
            TaskPatch {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
            true,
        )
        .unwrap()
        .unwrap();
        db.soft_delete_task(user.id, task_id).unwrap();

        assert!(db.task_history(user.id, task_id).unwrap().is_empty());
        assert!(
            db.list_history(user.id, &HistoryFilter::default())
                .unwrap()
                .is_empty()
        );
    }
}

mod preference_tests {
    use super::*;

    #[test]
    fn preferences_created_lazily_with_defaults() {
        let db = setup_db();
        let user = make_user(&db, "alice");

        let prefs = db.get_or_create_preferences(user.id).unwrap();
        assert!(!prefs.reminder_enabled);
        assert_eq!(prefs.reminder_time, "00:00:00");
        assert!(prefs.last_sent.is_none());

        // Second access returns the same row.
        let again = db.get_or_create_preferences(user.id).unwrap();
        assert_eq!(again.user_id, prefs.user_id);
    }

    #[test]
    fn update_preferences_keeps_last_sent() {
        let db = setup_db();
        let user = make_user(&db, "alice");
        db.get_or_create_preferences(user.id).unwrap();
        db.mark_reminder_sent(user.id, 1234).unwrap();

        let prefs = db.update_preferences(user.id, true, "10:00:00").unwrap();
        assert!(prefs.reminder_enabled);
        assert_eq!(prefs.reminder_time, "10:00:00");
        assert_eq!(prefs.last_sent, Some(1234));
    }

    #[test]
    fn due_reminders_matching() {
        let db = setup_db();
        let hour = 3_600_000i64;
        let now = 100 * hour;

        let never_sent = make_user(&db, "never_sent");
        db.update_preferences(never_sent.id, true, "00:00:00").unwrap();

        let sent_long_ago = make_user(&db, "sent_long_ago");
        db.update_preferences(sent_long_ago.id, true, "00:00:00").unwrap();
        db.mark_reminder_sent(sent_long_ago.id, now - 25 * hour).unwrap();

        let sent_recently = make_user(&db, "sent_recently");
        db.update_preferences(sent_recently.id, true, "00:00:00").unwrap();
        db.mark_reminder_sent(sent_recently.id, now - hour).unwrap();

        let disabled = make_user(&db, "disabled");
        db.update_preferences(disabled.id, false, "00:00:00").unwrap();

        let due = db.due_reminders(now, 24 * hour).unwrap();
        let names: Vec<&str> = due.iter().map(|(u, _)| u.username.as_str()).collect();
        assert_eq!(names, vec!["never_sent", "sent_long_ago"]);
    }
}

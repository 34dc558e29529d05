pub mod db;
pub mod kv_store;
pub mod model;
pub mod object_store;
pub mod relational_store;

pub use db::ForgeDb;
pub use kv_store::KvStore;
pub use model::{Task, TaskErrorInfo, TaskResult, User, VerificationCode};
pub use object_store::ObjectStore;
pub use relational_store::RelationalStore;

#[cfg(test)]
mod tests {
    use super::*;
    use swapforge_core::types::{EditMode, TaskId, TaskStatus, UserId};

    fn open_temp() -> ForgeDb {
        let dir = tempfile::tempdir().unwrap();
        ForgeDb::open(dir.path()).unwrap()
    }

    #[test]
    fn user_round_trips_by_id_and_email() {
        let db = open_temp();
        let user = User::new("User@Example.com".to_string(), 1_000);
        db.put_user(&user).unwrap();

        let by_id = db.get_user(&user.user_id).unwrap().unwrap();
        assert_eq!(by_id.email, "User@Example.com");

        let by_email = db.get_user_by_email("user@example.com").unwrap().unwrap();
        assert_eq!(by_email.user_id, user.user_id);
    }

    #[test]
    fn try_debit_rejects_when_insufficient() {
        let db = open_temp();
        let mut user = User::new("u@x.com".to_string(), 0);
        user.current_credits = 10;
        db.put_user(&user).unwrap();

        assert!(!db.try_debit(&user.user_id, 48).unwrap());
        let reloaded = db.get_user(&user.user_id).unwrap().unwrap();
        assert_eq!(reloaded.current_credits, 10);
    }

    #[test]
    fn try_debit_succeeds_and_tracks_total_used() {
        let db = open_temp();
        let mut user = User::new("u@x.com".to_string(), 0);
        user.current_credits = 100;
        db.put_user(&user).unwrap();

        assert!(db.try_debit(&user.user_id, 48).unwrap());
        let reloaded = db.get_user(&user.user_id).unwrap().unwrap();
        assert_eq!(reloaded.current_credits, 52);
        assert_eq!(reloaded.total_credits_used, 48);
    }

    #[test]
    fn update_status_rejects_terminal_transitions() {
        let db = open_temp();
        let task = sample_task();
        db.insert_task(&task).unwrap();

        assert!(db
            .update_status(&task.task_id, TaskStatus::Done, Some(100), None, None, None, None, 10)
            .unwrap());
        assert!(!db
            .update_status(&task.task_id, TaskStatus::Failed, None, None, None, None, None, 20)
            .unwrap());

        let reloaded = db.get_task(&task.task_id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Done);
    }

    #[test]
    fn list_tasks_is_scoped_to_owner() {
        let db = open_temp();
        let owner = UserId::generate();
        let other = UserId::generate();

        let mut mine = sample_task();
        mine.user_id = owner.clone();
        db.insert_task(&mine).unwrap();

        let mut theirs = sample_task();
        theirs.user_id = other;
        db.insert_task(&theirs).unwrap();

        let listed = db.list_tasks(&owner, None, None, 1, 10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, owner);
    }

    fn sample_task() -> Task {
        Task {
            task_id: TaskId::generate(1),
            user_id: UserId::generate(),
            mode: EditMode::HeadSwap,
            status: TaskStatus::Pending,
            progress: 0,
            current_step: "claimed".to_string(),
            source_image: "img_s".to_string(),
            reference_image: "img_r".to_string(),
            config: serde_json::json!({}),
            credits_consumed: 48,
            result: None,
            error: None,
            refunded: false,
            created_at: 1,
            updated_at: 1,
            completed_at: None,
            failed_at: None,
            processing_time: None,
        }
    }
}

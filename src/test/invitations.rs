#[cfg(test)]
mod tests {
    use crate::auth::{ProfileRole, teaches};
    use crate::db::{ReceivedInvitation, get_linked_students};
    use crate::error::AppError;
    use crate::forms::Operation;
    use crate::invitations::{accept, pending_invitations, propose, reject, respond};
    use crate::test::test_utils::{TestDb, TestDbBuilder};

    async fn two_strangers() -> TestDb {
        TestDbBuilder::new()
            .user("anna")
            .user("piotr")
            .build()
            .await
            .expect("Failed to build test database")
    }

    async fn invitation_count(test_db: &TestDb) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM invitations")
            .fetch_one(&test_db.pool)
            .await
            .expect("Failed to count invitations")
    }

    #[rocket::async_test]
    async fn test_propose_creates_missing_profiles() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;
        assert!(!anna.is_teacher());

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Teacher)
            .await
            .expect("Failed to propose");

        let anna = test_db.user("anna").await;
        let piotr = test_db.user("piotr").await;
        assert!(anna.is_teacher());
        assert!(!anna.is_student());
        assert!(piotr.is_student());
        assert!(!piotr.is_teacher());

        let pending = pending_invitations(&test_db.pool, &piotr).await.unwrap();
        assert_eq!(
            pending.from_teachers,
            vec![ReceivedInvitation {
                username: "anna".to_string(),
                invited_by: "teacher".to_string(),
            }]
        );
        assert!(pending.from_students.is_empty());

        let sent = pending_invitations(&test_db.pool, &anna).await.unwrap();
        assert!(sent.is_empty(), "The sender should see nothing pending");
    }

    #[rocket::async_test]
    async fn test_propose_twice_keeps_one_invitation() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Student).await.unwrap();
        propose(&test_db.pool, &anna, "piotr", ProfileRole::Student).await.unwrap();

        assert_eq!(invitation_count(&test_db).await, 1);

        let piotr = test_db.user("piotr").await;
        let pending = pending_invitations(&test_db.pool, &piotr).await.unwrap();
        assert_eq!(pending.from_students.len(), 1);
        assert_eq!(pending.from_students[0].username, "anna");
    }

    #[rocket::async_test]
    async fn test_propose_rejects_self_and_unknown_users() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        let result = propose(&test_db.pool, &anna, "anna", ProfileRole::Teacher).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = propose(&test_db.pool, &anna, "nobody", ProfileRole::Teacher).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert_eq!(invitation_count(&test_db).await, 0);
    }

    #[rocket::async_test]
    async fn test_propose_when_already_linked_fails() {
        let test_db = TestDbBuilder::new()
            .user("anna")
            .user("piotr")
            .teaches("anna", "piotr")
            .build()
            .await
            .expect("Failed to build test database");
        let anna = test_db.user("anna").await;

        let result = propose(&test_db.pool, &anna, "piotr", ProfileRole::Teacher).await;
        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "You are already linked with piotr."),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn test_accept_links_and_clears_both_directions() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Teacher).await.unwrap();
        // the same pair, proposed from the other side
        let piotr = test_db.user("piotr").await;
        propose(&test_db.pool, &piotr, "anna", ProfileRole::Student).await.unwrap();
        assert_eq!(invitation_count(&test_db).await, 2);

        accept(&test_db.pool, &piotr, "anna", ProfileRole::Teacher)
            .await
            .expect("Failed to accept");

        assert_eq!(invitation_count(&test_db).await, 0);

        let anna = test_db.user("anna").await;
        assert!(teaches(&test_db.pool, &anna, &piotr).await.unwrap());

        let teacher_id = anna.teacher_id.expect("anna should be a teacher");
        let students = get_linked_students(&test_db.pool, teacher_id).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].username, "piotr");
    }

    #[rocket::async_test]
    async fn test_accept_twice_does_not_duplicate_link() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Teacher).await.unwrap();
        let piotr = test_db.user("piotr").await;
        accept(&test_db.pool, &piotr, "anna", ProfileRole::Teacher).await.unwrap();

        let second = accept(&test_db.pool, &piotr, "anna", ProfileRole::Teacher).await;
        assert!(matches!(second, Err(AppError::NotFound(_))));

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teacher_students")
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
        assert_eq!(links, 1);
    }

    #[rocket::async_test]
    async fn test_reject_clears_without_linking() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Student).await.unwrap();
        let anna = test_db.user("anna").await;
        let piotr = test_db.user("piotr").await;

        respond(&test_db.pool, &piotr, "anna", ProfileRole::Student, Operation::No)
            .await
            .expect("Failed to reject");

        assert_eq!(invitation_count(&test_db).await, 0);
        assert!(!teaches(&test_db.pool, &piotr, &anna).await.unwrap());
    }

    #[rocket::async_test]
    async fn test_respond_with_wrong_role_is_not_found() {
        let test_db = two_strangers().await;
        let anna = test_db.user("anna").await;

        propose(&test_db.pool, &anna, "piotr", ProfileRole::Teacher).await.unwrap();
        let piotr = test_db.user("piotr").await;

        let result = reject(&test_db.pool, &piotr, "anna", ProfileRole::Student).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(invitation_count(&test_db).await, 1);
    }
}

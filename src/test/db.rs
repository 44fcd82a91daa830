#[cfg(test)]
mod tests {
    use crate::db::{
        authenticate_user, create_composer, create_goal, create_part, create_piece, create_task,
        create_user, delete_goal, delete_piece, delete_task, get_challenges, get_composers,
        get_goal, get_goals, get_parts, get_piece, get_practices_for_task, get_task, get_tasks,
        get_user_by_username, update_goal, update_piece, update_task,
    };
    use crate::error::AppError;
    use crate::models::{GoalData, PieceData, PieceInformation, PracticeData, TaskData};
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db, date,
    };

    #[rocket::async_test]
    async fn test_create_and_authenticate_user() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let id = create_user(&test_db.pool, "new_user", STANDARD_PASSWORD, Some("new@example.com"))
            .await
            .expect("Failed to create user");

        let user = get_user_by_username(&test_db.pool, "new_user").await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("new@example.com"));
        assert!(!user.is_student());
        assert!(!user.is_teacher());

        let authenticated = authenticate_user(&test_db.pool, "new_user", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert_eq!(authenticated.map(|u| u.id), Some(id));

        let wrong = authenticate_user(&test_db.pool, "new_user", "wrong_password")
            .await
            .unwrap();
        assert!(wrong.is_none());

        let duplicate = create_user(&test_db.pool, "new_user", STANDARD_PASSWORD, None).await;
        assert!(matches!(duplicate, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_goal_round_trip_with_pieces() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");
        let piece_id = test_db.piece_id("Asturias");

        let data = GoalData {
            piece: "Something by Tarrega".to_string(),
            piece_ids: vec![piece_id],
            date: Some(date("2024-09-01")),
            ..GoalData::default()
        };
        let goal_id = create_goal(&test_db.pool, student_id, &data).await.unwrap();

        let goal = get_goal(&test_db.pool, student_id, goal_id).await.unwrap();
        assert_eq!(goal.piece_ids, vec![piece_id]);
        assert_eq!(goal.label(), "Something by Tarrega");

        let piece = get_piece(&test_db.pool, student_id, piece_id).await.unwrap();
        assert!(piece.goal_ids.contains(&goal_id));

        let updated = GoalData {
            name: "Autumn concert".to_string(),
            is_concluded: true,
            ..data
        };
        update_goal(&test_db.pool, student_id, goal_id, &GoalData { piece_ids: vec![], ..updated })
            .await
            .unwrap();

        let goal = get_goal(&test_db.pool, student_id, goal_id).await.unwrap();
        assert_eq!(goal.name, "Autumn concert");
        assert!(goal.is_concluded);
        assert!(goal.piece_ids.is_empty());
    }

    #[rocket::async_test]
    async fn test_goals_are_private_to_their_owner() {
        let test_db = create_standard_test_db().await;
        let stranger_id = test_db.user_id("stranger");
        let goal_id = test_db.goal_id("Spring recital");

        assert!(get_goals(&test_db.pool, stranger_id).await.unwrap().is_empty());
        assert!(matches!(
            get_goal(&test_db.pool, stranger_id, goal_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_goal(&test_db.pool, stranger_id, goal_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn test_deleting_goal_detaches_tasks() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");

        delete_goal(&test_db.pool, student_id, test_db.goal_id("Spring recital"))
            .await
            .unwrap();

        let task = get_task(&test_db.pool, student_id, test_db.task_id("Tremolo"))
            .await
            .expect("Task should survive its goal");
        assert_eq!(task.goal_id, None);
        assert_eq!(task.piece_id, Some(test_db.piece_id("Asturias")));
    }

    #[rocket::async_test]
    async fn test_piece_information_and_composers() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");

        let composer_id = create_composer(&test_db.pool, student_id, "Isaac Albeniz")
            .await
            .unwrap();
        let data = PieceData {
            name_to_display: "Granada".to_string(),
            composer_ids: vec![composer_id],
            information: PieceInformation {
                collection: "Suite espanola".to_string(),
                musical_key: "F major".to_string(),
                ..PieceInformation::default()
            },
            ..PieceData::default()
        };
        let piece_id = create_piece(&test_db.pool, student_id, &data).await.unwrap();

        let piece = get_piece(&test_db.pool, student_id, piece_id).await.unwrap();
        assert_eq!(piece.composers.len(), 1);
        assert_eq!(piece.composers[0].name, "Isaac Albeniz");
        let info = piece.information.expect("Information was stored");
        assert_eq!(info.musical_key, "F major");

        update_piece(
            &test_db.pool,
            student_id,
            piece_id,
            &PieceData {
                name_to_display: "Granada".to_string(),
                is_mastered: true,
                ..PieceData::default()
            },
        )
        .await
        .unwrap();

        let piece = get_piece(&test_db.pool, student_id, piece_id).await.unwrap();
        assert!(piece.is_mastered);
        assert!(piece.composers.is_empty());
        assert!(piece.information.is_none(), "Blank information is removed");

        let composers = get_composers(&test_db.pool, student_id).await.unwrap();
        assert_eq!(composers.len(), 1, "Composers outlive the pieces they wrote");
    }

    #[rocket::async_test]
    async fn test_deleting_piece_keeps_task_when_goal_remains() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");

        delete_piece(&test_db.pool, student_id, test_db.piece_id("Asturias"))
            .await
            .unwrap();

        let task = get_task(&test_db.pool, student_id, test_db.task_id("Tremolo"))
            .await
            .unwrap();
        assert_eq!(task.piece_id, None);
        assert_eq!(task.goal_name.as_deref(), Some("Spring recital"));
    }

    #[rocket::async_test]
    async fn test_task_with_parts_and_first_practice() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");

        let part_id = create_part(&test_db.pool, student_id, "Coda").await.unwrap();
        let data = TaskData {
            piece_id: Some(test_db.piece_id("Asturias")),
            element: "Coda".to_string(),
            method: "Slow practice".to_string(),
            part_ids: vec![part_id],
            ..TaskData::default()
        };
        let practice = PracticeData {
            date: date("2024-06-01"),
            start_time: None,
            end_time: None,
            repetitions: 3,
            is_summarized: false,
            is_completed: false,
        };
        let task_id = create_task(&test_db.pool, student_id, &data, Some(&practice))
            .await
            .unwrap();

        let task = get_task(&test_db.pool, student_id, task_id).await.unwrap();
        assert_eq!(task.part_ids, vec![part_id]);
        assert!(task.was_practiced);
        assert_eq!(task.label(), "Asturias / Coda / Slow practice");

        let practices = get_practices_for_task(&test_db.pool, task_id).await.unwrap();
        assert_eq!(practices.len(), 1);
        assert_eq!(practices[0].repetitions, 3);

        update_task(&test_db.pool, student_id, task_id, &TaskData { part_ids: vec![], ..data })
            .await
            .unwrap();
        let task = get_task(&test_db.pool, student_id, task_id).await.unwrap();
        assert!(task.part_ids.is_empty());
        assert_eq!(get_parts(&test_db.pool, student_id).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn test_deleting_task_removes_practices_and_challenges() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");
        let task_id = test_db.task_id("Tremolo");

        delete_task(&test_db.pool, student_id, task_id).await.unwrap();

        assert!(get_tasks(&test_db.pool, student_id).await.unwrap().is_empty());
        assert!(get_practices_for_task(&test_db.pool, task_id).await.unwrap().is_empty());
        assert!(get_challenges(&test_db.pool, student_id).await.unwrap().is_empty());
    }
}

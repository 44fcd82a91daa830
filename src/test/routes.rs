#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::Value;

    use crate::db::{get_challenge, get_practices_for_task, get_tasks};
    use crate::forms::TAMPERED;
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDb, create_standard_test_db, login_test_user, setup_test_client,
    };
    use crate::validation::{NON_FIELD_ERRORS, ValidationResponse};

    async fn client_as(username: &str) -> (Client, TestDb, Vec<Cookie<'static>>) {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let cookies = login_test_user(&client, username, STANDARD_PASSWORD).await;
        (client, test_db, cookies)
    }

    async fn get<'c>(
        client: &'c Client,
        cookies: &[Cookie<'static>],
        uri: String,
    ) -> LocalResponse<'c> {
        client.get(uri).cookies(cookies.to_vec()).dispatch().await
    }

    async fn post_form<'c>(
        client: &'c Client,
        cookies: &[Cookie<'static>],
        uri: String,
        body: String,
    ) -> LocalResponse<'c> {
        client
            .post(uri)
            .header(ContentType::Form)
            .cookies(cookies.to_vec())
            .body(body)
            .dispatch()
            .await
    }

    fn location(response: &LocalResponse<'_>) -> Option<String> {
        response.headers().get_one("Location").map(String::from)
    }

    #[rocket::async_test]
    async fn test_health_is_public() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.as_deref(), Some("OK"));
    }

    #[rocket::async_test]
    async fn test_auth_required() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        for endpoint in ["/me", "/student", "/student/tasks", "/student/2024", "/invitations"] {
            let response = client.get(endpoint).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Unauthorized,
                "Endpoint {} did not require authentication",
                endpoint
            );
            let body: ValidationResponse = response.into_json().await.expect("JSON error body");
            assert_eq!(body.status, "error");
        }

        let forged = Cookie::build(("session_token", "fake_token")).build();
        let response = client.get("/me").private_cookie(forged).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_teacher_reads_student_but_stranger_does_not() {
        let (client, _db, teacher) = client_as("teacher").await;

        let response = get(&client, &teacher, "/student/tasks".to_string()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["owner"], "student");
        assert_eq!(body["items"].as_array().map(Vec::len), Some(1));

        let response = get(&client, &teacher, "/student".to_string()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["teachers"], serde_json::json!(["teacher"]));

        let stranger = login_test_user(&client, "stranger", STANDARD_PASSWORD).await;
        let response = get(&client, &stranger, "/student/tasks".to_string()).await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = get(&client, &stranger, "/nobody/tasks".to_string()).await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_goal_writes_are_owner_only() {
        let (client, _db, student) = client_as("student").await;

        let response = post_form(
            &client,
            &student,
            "/student/goals/new".to_string(),
            "name=Summer%20exam&date=01.07.2024".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert!(location(&response).is_some_and(|l| l.starts_with("/student/goals/")));

        let teacher = login_test_user(&client, "teacher", STANDARD_PASSWORD).await;
        let response = post_form(
            &client,
            &teacher,
            "/student/goals/new".to_string(),
            "name=Imposed%20goal".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = get(&client, &teacher, "/student/goals".to_string()).await;
        let body: Value = response.into_json().await.unwrap();
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|goal| goal["name"].as_str())
            .collect();
        assert!(names.contains(&"Summer exam"));
        assert!(!names.contains(&"Imposed goal"));
    }

    #[rocket::async_test]
    async fn test_invalid_form_is_returned_with_errors() {
        let (client, _db, student) = client_as("student").await;

        let response =
            post_form(&client, &student, "/student/goals/new".to_string(), String::new()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("name"));
        assert!(body.errors.contains_key("additional_info"));

        let response = post_form(
            &client,
            &student,
            "/student/tasks/new".to_string(),
            "element=Scales&date=someday".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("goal"));
        assert!(body.errors.contains_key("piece"));
        assert!(body.errors.contains_key("date"), "Practice errors are merged in");
    }

    #[rocket::async_test]
    async fn test_teacher_adds_task_with_practice() {
        let (client, test_db, teacher) = client_as("teacher").await;
        let piece_id = test_db.piece_id("Asturias");

        let response = post_form(
            &client,
            &teacher,
            "/student/tasks/new".to_string(),
            format!("piece={}&element=Scales&date=2024-06-01&repetitions=4", piece_id),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);

        let tasks = get_tasks(&test_db.pool, test_db.user_id("student")).await.unwrap();
        let scales = tasks
            .iter()
            .find(|task| task.element == "Scales")
            .expect("Task was created for the student");
        assert!(scales.was_practiced);

        let practices = get_practices_for_task(&test_db.pool, scales.id).await.unwrap();
        assert_eq!(practices.len(), 1);
        assert_eq!(practices[0].repetitions, 4);
    }

    #[rocket::async_test]
    async fn test_task_delete_confirmation() {
        let (client, test_db, student) = client_as("student").await;
        let task_id = test_db.task_id("Tremolo");

        let response = get(&client, &student, format!("/student/tasks/{}/delete", task_id)).await;
        assert_eq!(response.status(), Status::Ok);

        let response = post_form(
            &client,
            &student,
            format!("/student/tasks/{}/delete", task_id),
            "operation=Nie".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some(format!("/student/tasks/{}", task_id)));

        let response = post_form(
            &client,
            &student,
            format!("/student/tasks/{}/delete", task_id),
            "operation=Tak".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some("/student/tasks".to_string()));

        let practices = get_practices_for_task(&test_db.pool, task_id).await.unwrap();
        assert!(practices.is_empty(), "Practices go with their task");

        let response = get(&client, &student, format!("/student/tasks/{}", task_id)).await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_only_teacher_confirms_challenge() {
        let (client, test_db, student) = client_as("student").await;
        let challenge_id = test_db.challenge_id("Tremolo");
        let confirm = format!("/student/challenges/{}/confirm", challenge_id);

        let response = get(&client, &student, confirm.clone()).await;
        assert_eq!(response.status(), Status::Forbidden);

        let teacher = login_test_user(&client, "teacher", STANDARD_PASSWORD).await;
        let response = get(&client, &teacher, confirm.clone()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["evaluation"]["is_fulfilled"], true);
        assert_eq!(body["evaluation"]["state"], "fulfilled_unconfirmed");

        let student_id = test_db.user_id("student");
        let stored = get_challenge(&test_db.pool, student_id, challenge_id).await.unwrap();
        assert!(stored.are_requirements_fulfilled);
        assert!(!stored.is_completed);

        let response = post_form(&client, &teacher, confirm, "operation=Tak".to_string()).await;
        assert_eq!(response.status(), Status::SeeOther);

        let stored = get_challenge(&test_db.pool, student_id, challenge_id).await.unwrap();
        assert!(stored.is_completed);
    }

    #[rocket::async_test]
    async fn test_student_cannot_complete_own_challenge() {
        let (client, test_db, student) = client_as("student").await;
        let challenge_id = test_db.challenge_id("Tremolo");
        let student_id = test_db.user_id("student");
        let update = format!("/student/challenges/{}/update", challenge_id);
        let body = "minimum_number_of_days=3&minimum_number_of_repetitions=5\
                    &minimum_total_repetitions=20&is_completed=true";

        let response = post_form(&client, &student, update.clone(), body.to_string()).await;
        assert_eq!(response.status(), Status::SeeOther);

        let stored = get_challenge(&test_db.pool, student_id, challenge_id).await.unwrap();
        assert_eq!(stored.minimum_number_of_days, 3);
        assert!(!stored.is_completed);

        let teacher = login_test_user(&client, "teacher", STANDARD_PASSWORD).await;
        let response = post_form(&client, &teacher, update, body.to_string()).await;
        assert_eq!(response.status(), Status::SeeOther);

        let stored = get_challenge(&test_db.pool, student_id, challenge_id).await.unwrap();
        assert!(stored.is_completed);
    }

    #[rocket::async_test]
    async fn test_invitation_flow() {
        let (client, _db, stranger) = client_as("stranger").await;

        let response = post_form(
            &client,
            &stranger,
            "/invitations".to_string(),
            "invited=nobody&invitation_type=teacher".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert_eq!(
            body.errors.get("invited"),
            Some(&vec!["User does not exist.".to_string()])
        );

        let response = post_form(
            &client,
            &stranger,
            "/invitations".to_string(),
            "invited=student&inviting=stranger&invitation_type=teacher".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some("/invitations".to_string()));

        let student = login_test_user(&client, "student", STANDARD_PASSWORD).await;
        let response = get(&client, &student, "/invitations".to_string()).await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["from_teachers"][0]["username"], "stranger");

        let response = get(&client, &student, "/invitations/teacher/stranger".to_string()).await;
        assert_eq!(response.status(), Status::Ok);

        let response = post_form(
            &client,
            &student,
            "/invitations/teacher/stranger".to_string(),
            "operation=Tak".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::SeeOther);

        let response = get(&client, &stranger, "/student/tasks".to_string()).await;
        assert_eq!(response.status(), Status::Ok, "Accepted teacher can read");
    }

    #[rocket::async_test]
    async fn test_tampered_invitation_type() {
        let (client, _db, student) = client_as("student").await;

        let response = get(&client, &student, "/invitations/headmaster/teacher".to_string()).await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert_eq!(body.errors.get(NON_FIELD_ERRORS), Some(&vec![TAMPERED.to_string()]));

        let response = post_form(
            &client,
            &student,
            "/invitations".to_string(),
            "invited=stranger&inviting=teacher&invitation_type=student".to_string(),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert_eq!(body.errors.get(NON_FIELD_ERRORS), Some(&vec![TAMPERED.to_string()]));
    }

    #[rocket::async_test]
    async fn test_calendar_routes() {
        let (client, _db, student) = client_as("student").await;

        let response = get(&client, &student, "/student/2024".to_string()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["months"].as_array().map(Vec::len), Some(12));

        let response = get(&client, &student, "/student/2024/5/1".to_string()).await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["practices"][0]["task_label"], "Asturias / Tremolo");

        let response = get(&client, &student, "/student/2024/13".to_string()).await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_suggestions_are_owner_only() {
        let (client, _db, student) = client_as("student").await;

        let response = get(&client, &student, "/student/suggestions".to_string()).await;
        assert_eq!(response.status(), Status::Ok);

        let teacher = login_test_user(&client, "teacher", STANDARD_PASSWORD).await;
        let response = get(&client, &teacher, "/student/suggestions".to_string()).await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_register() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/user/create")
            .header(ContentType::Form)
            .body("username=newbie&password1=longenough&password2=longenough")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(location(&response), Some("/login".to_string()));

        let cookies = login_test_user(&client, "newbie", "longenough").await;
        let response = client.get("/me").cookies(cookies).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post("/user/create")
            .header(ContentType::Form)
            .body("username=newbie&password1=longenough&password2=longenough")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "Taken username re-renders the form");
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key(NON_FIELD_ERRORS));
    }
}

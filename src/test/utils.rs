#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Once;

    use chrono::NaiveDate;
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};

    use crate::auth::{ProfileRole, User};
    use crate::config::AppConfig;
    use crate::db::{
        create_challenge, create_goal, create_piece, create_practice, create_task, create_user,
        ensure_profile, get_user_by_username, link_in,
    };
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{ChallengeData, GoalData, PieceData, PracticeData, TaskData};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("Invalid test date")
    }

    struct TestUser {
        username: String,
        email: Option<String>,
    }

    struct TestGoal {
        owner: String,
        name: String,
        date: Option<NaiveDate>,
    }

    struct TestPiece {
        owner: String,
        name: String,
    }

    struct TestTask {
        owner: String,
        element: String,
        goal: Option<String>,
        piece: Option<String>,
        suggestions_enabled: bool,
    }

    struct TestPractice {
        task: String,
        date: NaiveDate,
        repetitions: i64,
    }

    struct TestChallenge {
        task: String,
        minimum_number_of_days: i64,
        minimum_number_of_repetitions: i64,
        minimum_total_repetitions: i64,
    }

    /// Seeds an in-memory database. Goals, pieces and tasks are referred to
    /// by name; a task's name is its `element`.
    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        links: Vec<(String, String)>,
        goals: Vec<TestGoal>,
        pieces: Vec<TestPiece>,
        tasks: Vec<TestTask>,
        practices: Vec<TestPractice>,
        challenges: Vec<TestChallenge>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: None,
            });
            self
        }

        pub fn user_with_email(mut self, username: &str, email: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                email: Some(email.to_string()),
            });
            self
        }

        /// Confirmed teacher-student link, profiles included.
        pub fn teaches(mut self, teacher: &str, student: &str) -> Self {
            self.links.push((teacher.to_string(), student.to_string()));
            self
        }

        pub fn goal(mut self, owner: &str, name: &str, date: Option<&str>) -> Self {
            self.goals.push(TestGoal {
                owner: owner.to_string(),
                name: name.to_string(),
                date: date.map(self::date),
            });
            self
        }

        pub fn piece(mut self, owner: &str, name: &str) -> Self {
            self.pieces.push(TestPiece {
                owner: owner.to_string(),
                name: name.to_string(),
            });
            self
        }

        pub fn task(
            mut self,
            owner: &str,
            element: &str,
            goal: Option<&str>,
            piece: Option<&str>,
        ) -> Self {
            self.tasks.push(TestTask {
                owner: owner.to_string(),
                element: element.to_string(),
                goal: goal.map(String::from),
                piece: piece.map(String::from),
                suggestions_enabled: false,
            });
            self
        }

        pub fn suggested_task(mut self, owner: &str, element: &str, piece: &str) -> Self {
            self.tasks.push(TestTask {
                owner: owner.to_string(),
                element: element.to_string(),
                goal: None,
                piece: Some(piece.to_string()),
                suggestions_enabled: true,
            });
            self
        }

        pub fn practice(mut self, task: &str, date: &str, repetitions: i64) -> Self {
            self.practices.push(TestPractice {
                task: task.to_string(),
                date: self::date(date),
                repetitions,
            });
            self
        }

        pub fn challenge(
            mut self,
            task: &str,
            minimum_number_of_days: i64,
            minimum_number_of_repetitions: i64,
            minimum_total_repetitions: i64,
        ) -> Self {
            self.challenges.push(TestChallenge {
                task: task.to_string(),
                minimum_number_of_days,
                minimum_number_of_repetitions,
                minimum_total_repetitions,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter("debug,sqlx=warn")
                    .with_test_writer()
                    .try_init();
            });

            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut goal_id_map: HashMap<String, i64> = HashMap::new();
            let mut piece_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_owner_map: HashMap<String, i64> = HashMap::new();
            let mut challenge_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let id = create_user(
                    &pool,
                    &user.username,
                    STANDARD_PASSWORD,
                    user.email.as_deref(),
                )
                .await?;
                user_id_map.insert(user.username.clone(), id);
            }

            let lookup = |map: &HashMap<String, i64>, key: &str| {
                map.get(key)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(format!("Unknown test fixture {}", key)))
            };

            for (teacher, student) in &self.links {
                let teacher_id =
                    ensure_profile(&pool, lookup(&user_id_map, teacher)?, ProfileRole::Teacher)
                        .await?;
                let student_id =
                    ensure_profile(&pool, lookup(&user_id_map, student)?, ProfileRole::Student)
                        .await?;
                let mut conn = pool.acquire().await?;
                link_in(&mut conn, teacher_id, student_id).await?;
            }

            for goal in &self.goals {
                let data = GoalData {
                    name: goal.name.clone(),
                    date: goal.date,
                    ..GoalData::default()
                };
                let id = create_goal(&pool, lookup(&user_id_map, &goal.owner)?, &data).await?;
                goal_id_map.insert(goal.name.clone(), id);
            }

            for piece in &self.pieces {
                let data = PieceData {
                    name_to_display: piece.name.clone(),
                    ..PieceData::default()
                };
                let id = create_piece(&pool, lookup(&user_id_map, &piece.owner)?, &data).await?;
                piece_id_map.insert(piece.name.clone(), id);
            }

            for task in &self.tasks {
                let owner_id = lookup(&user_id_map, &task.owner)?;
                let data = TaskData {
                    goal_id: match &task.goal {
                        Some(name) => Some(lookup(&goal_id_map, name)?),
                        None => None,
                    },
                    piece_id: match &task.piece {
                        Some(name) => Some(lookup(&piece_id_map, name)?),
                        None => None,
                    },
                    element: task.element.clone(),
                    are_suggestions_enabled: task.suggestions_enabled,
                    ..TaskData::default()
                };
                let id = create_task(&pool, owner_id, &data, None).await?;
                task_id_map.insert(task.element.clone(), id);
                task_owner_map.insert(task.element.clone(), owner_id);
            }

            for practice in &self.practices {
                let data = PracticeData {
                    date: practice.date,
                    start_time: None,
                    end_time: None,
                    repetitions: practice.repetitions,
                    is_summarized: false,
                    is_completed: false,
                };
                create_practice(
                    &pool,
                    lookup(&task_owner_map, &practice.task)?,
                    lookup(&task_id_map, &practice.task)?,
                    &data,
                )
                .await?;
            }

            for challenge in &self.challenges {
                let data = ChallengeData {
                    minimum_number_of_days: challenge.minimum_number_of_days,
                    minimum_number_of_repetitions: challenge.minimum_number_of_repetitions,
                    minimum_total_repetitions: challenge.minimum_total_repetitions,
                    ..ChallengeData::default()
                };
                let id = create_challenge(
                    &pool,
                    lookup(&task_owner_map, &challenge.task)?,
                    lookup(&task_id_map, &challenge.task)?,
                    &data,
                )
                .await?;
                challenge_id_map.insert(challenge.task.clone(), id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                goal_id_map,
                piece_id_map,
                task_id_map,
                challenge_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub goal_id_map: HashMap<String, i64>,
        pub piece_id_map: HashMap<String, i64>,
        pub task_id_map: HashMap<String, i64>,
        pub challenge_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn goal_id(&self, name: &str) -> i64 {
            self.goal_id_map[name]
        }

        pub fn piece_id(&self, name: &str) -> i64 {
            self.piece_id_map[name]
        }

        pub fn task_id(&self, element: &str) -> i64 {
            self.task_id_map[element]
        }

        /// Challenge attached to the task named `element`.
        pub fn challenge_id(&self, element: &str) -> i64 {
            self.challenge_id_map[element]
        }

        pub async fn user(&self, username: &str) -> User {
            get_user_by_username(&self.pool, username)
                .await
                .expect("Failed to load test user")
        }
    }

    /// The cast most tests need: `teacher` teaches `student`, `stranger` is
    /// unrelated. `student` owns a goal, a piece, a task with two practices
    /// and a challenge on it.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user_with_email("student", "student@example.com")
            .user("teacher")
            .user("stranger")
            .teaches("teacher", "student")
            .goal("student", "Spring recital", Some("2024-05-20"))
            .piece("student", "Asturias")
            .task("student", "Tremolo", Some("Spring recital"), Some("Asturias"))
            .practice("Tremolo", "2024-05-01", 10)
            .practice("Tremolo", "2024-05-02", 10)
            .challenge("Tremolo", 2, 5, 20)
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), AppConfig::default()).await;
        let client = Client::untracked(rocket)
            .await
            .expect("Failed to create test client");
        (client, test_db)
    }

    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/login")
            .header(ContentType::Form)
            .body(format!("username={}&password={}", username, password))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::SeeOther, "Login did not redirect");

        response
            .cookies()
            .iter()
            .map(|cookie| cookie.clone().into_owned())
            .collect()
    }
}

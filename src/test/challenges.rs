#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::challenges::{
        ChallengeState, check_if_fulfilled, check_number_of_days, check_total_repetitions,
        evaluate, state_of,
    };
    use crate::db::{get_challenge, mark_challenge_completed, update_challenge};
    use crate::models::{Challenge, ChallengeData, Practice};
    use crate::test::test_utils::{create_standard_test_db, date};

    fn challenge(days: i64, repetitions_per_day: i64, total: i64) -> Challenge {
        Challenge {
            id: 1,
            user_id: 1,
            task_id: 1,
            start_date: None,
            minimum_number_of_days: days,
            minimum_number_of_repetitions: repetitions_per_day,
            minimum_total_repetitions: total,
            are_requirements_fulfilled: false,
            is_completed: false,
            created_at: Utc::now(),
        }
    }

    fn practice(id: i64, day: &str, repetitions: i64) -> Practice {
        Practice {
            id,
            task_id: 1,
            date: date(day),
            start_time: None,
            end_time: None,
            repetitions,
            is_summarized: false,
            is_completed: false,
        }
    }

    #[test]
    fn test_no_practices_never_fulfils() {
        let c = challenge(0, 0, 0);
        assert!(!check_number_of_days(&c, &[]));
        assert!(!check_total_repetitions(&c, &[]));
        assert!(!check_if_fulfilled(&c, &[]));
    }

    #[test]
    fn test_zero_thresholds_pass_with_any_practice() {
        let c = challenge(0, 0, 0);
        let practices = vec![practice(1, "2024-03-01", 0)];
        assert!(check_if_fulfilled(&c, &practices));
    }

    #[test]
    fn test_days_are_counted_per_date() {
        // Two sessions on the same day add up to 6 repetitions.
        let c = challenge(2, 5, 0);
        let practices = vec![
            practice(1, "2024-03-01", 3),
            practice(2, "2024-03-01", 3),
            practice(3, "2024-03-02", 4),
        ];
        assert!(!check_number_of_days(&c, &practices));

        let mut practices = practices;
        practices.push(practice(4, "2024-03-02", 1));
        assert!(check_number_of_days(&c, &practices));
    }

    #[test]
    fn test_total_repetitions_threshold() {
        let c = challenge(0, 0, 25);
        let practices = vec![practice(1, "2024-03-01", 12), practice(2, "2024-03-05", 12)];
        assert!(!check_total_repetitions(&c, &practices));

        let practices = vec![practice(1, "2024-03-01", 12), practice(2, "2024-03-05", 13)];
        assert!(check_total_repetitions(&c, &practices));
    }

    #[test]
    fn test_both_requirements_needed() {
        let c = challenge(3, 1, 10);
        let practices = vec![
            practice(1, "2024-03-01", 20),
            practice(2, "2024-03-02", 1),
        ];
        let evaluation = evaluate(&c, &practices);

        assert_eq!(evaluation.qualifying_days, 2);
        assert_eq!(evaluation.total_repetitions, 21);
        assert!(!evaluation.days_requirement_met);
        assert!(evaluation.repetitions_requirement_met);
        assert!(!evaluation.is_fulfilled);
        assert_eq!(evaluation.state, ChallengeState::Pending);
    }

    #[test]
    fn test_state_of_challenge() {
        let mut c = challenge(1, 1, 1);
        assert_eq!(state_of(&c, false), ChallengeState::Pending);
        assert_eq!(state_of(&c, true), ChallengeState::FulfilledUnconfirmed);

        c.is_completed = true;
        assert_eq!(state_of(&c, false), ChallengeState::Completed);
        assert_eq!(state_of(&c, true), ChallengeState::Completed);
    }

    #[rocket::async_test]
    async fn test_update_never_clears_completion() {
        let test_db = create_standard_test_db().await;
        let student_id = test_db.user_id("student");
        let challenge_id = test_db.challenge_id("Tremolo");

        mark_challenge_completed(&test_db.pool, challenge_id)
            .await
            .expect("Failed to complete challenge");

        let data = ChallengeData {
            minimum_number_of_days: 4,
            ..ChallengeData::default()
        };
        update_challenge(&test_db.pool, student_id, challenge_id, &data, false)
            .await
            .expect("Failed to update challenge");

        let stored = get_challenge(&test_db.pool, student_id, challenge_id)
            .await
            .expect("Failed to load challenge");
        assert!(stored.is_completed);
        assert_eq!(stored.minimum_number_of_days, 4);
    }

    #[rocket::async_test]
    async fn test_update_of_foreign_challenge_is_not_found() {
        let test_db = create_standard_test_db().await;
        let stranger_id = test_db.user_id("stranger");
        let challenge_id = test_db.challenge_id("Tremolo");

        let result = update_challenge(
            &test_db.pool,
            stranger_id,
            challenge_id,
            &ChallengeData::default(),
            true,
        )
        .await;
        assert!(matches!(result, Err(crate::error::AppError::NotFound(_))));
    }
}

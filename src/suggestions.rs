use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{error, info, instrument, warn};

use crate::auth::User;
use crate::db::{
    get_practice_date_range, get_tasks_with_suggestions_enabled, get_user, set_task_suggested,
};
use crate::error::AppError;
use crate::mail::{Mail, Mailer};
use crate::models::Task;

/// Days after the first practice on which a task is worth revisiting.
pub const SUGGESTION_INTERVALS: [i64; 5] = [3, 4, 7, 28, 84];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub tasks_seen: usize,
    pub suggested: usize,
    pub mails_sent: usize,
    pub mail_failures: usize,
}

pub fn compute_is_suggested(first_practice: Option<NaiveDate>, today: NaiveDate) -> bool {
    match first_practice {
        Some(first) => SUGGESTION_INTERVALS.contains(&(today - first).num_days()),
        None => false,
    }
}

/// The reminder for `owner`, or `None` when they have no address to send it to.
pub fn suggestion_mail(
    owner: &User,
    task: &Task,
    last_practice: NaiveDate,
    from: &str,
) -> Option<Mail> {
    let to = owner.email.as_deref()?;

    Some(Mail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Time to revisit: {}", task.label()),
        body: format!(
            "Hi {},\n\nToday is a good day to practise \"{}\" again. \
             You last practised it on {}.\n",
            owner.display_name(),
            task.label(),
            last_practice.format("%Y-%m-%d")
        ),
    })
}

/// Recomputes `is_suggested` for every task that has suggestions enabled and
/// mails the owners of the tasks that came up. A failed mail does not stop
/// the sweep.
#[instrument(skip(pool, mailer, mail_from))]
pub async fn run_suggestion_sweep(
    pool: &Pool<Sqlite>,
    mailer: &dyn Mailer,
    mail_from: &str,
    today: NaiveDate,
) -> Result<SweepReport, AppError> {
    info!("Running suggestion sweep");
    let mut report = SweepReport::default();
    let mut owners: HashMap<i64, User> = HashMap::new();

    for task in get_tasks_with_suggestions_enabled(pool).await? {
        report.tasks_seen += 1;

        let range = get_practice_date_range(pool, task.id).await?;
        let is_suggested = compute_is_suggested(range.map(|(first, _)| first), today);
        set_task_suggested(pool, task.id, is_suggested).await?;

        let Some((_, last_practice)) = range.filter(|_| is_suggested) else {
            continue;
        };
        report.suggested += 1;

        if !owners.contains_key(&task.user_id) {
            let owner = get_user(pool, task.user_id).await?;
            owners.insert(task.user_id, owner);
        }
        let Some(owner) = owners.get(&task.user_id) else {
            continue;
        };

        let Some(mail) = suggestion_mail(owner, &task, last_practice, mail_from) else {
            continue;
        };

        match mailer.send(&mail).await {
            Ok(()) => report.mails_sent += 1,
            Err(e) => {
                e.log_and_record("Sending suggestion mail");
                warn!(task_id = task.id, to = %mail.to, "Suggestion mail failed");
                report.mail_failures += 1;
            }
        }
    }

    info!(
        tasks_seen = report.tasks_seen,
        suggested = report.suggested,
        mails_sent = report.mails_sent,
        mail_failures = report.mail_failures,
        "Suggestion sweep finished"
    );
    Ok(report)
}

/// Repeats the sweep every `interval_secs` seconds for the life of the process.
pub async fn run_suggestion_loop(
    pool: Pool<Sqlite>,
    mailer: Box<dyn Mailer>,
    mail_from: String,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        let today = Utc::now().date_naive();
        if let Err(e) = run_suggestion_sweep(&pool, mailer.as_ref(), &mail_from, today).await {
            error!(error = %e, "Suggestion sweep failed");
        }
    }
}

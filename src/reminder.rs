//! Periodic reminder emails summarizing a user's tasks.

use crate::config::ReminderConfig;
use crate::db::{Database, now_ms};
use crate::mail::{MailTransport, Message};
use crate::types::{TaskStatus, User};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Subject line for every summary email.
const SUBJECT: &str = "Tasks summary";

/// Outcome of one scheduler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Render the summary body: counts of the user's non-deleted tasks grouped
/// by status label, statuses with no tasks omitted.
pub fn compose_summary(username: &str, counts: &[(TaskStatus, i64)]) -> String {
    let mut body = format!("Hello {}!\n\n", username);
    body.push_str("Here is your tasks summary:\n");
    for (status, count) in counts {
        if *count > 0 {
            body.push_str(&format!("\n{} {} task(s).\n", count, status.label()));
        }
    }
    body.push_str("\n\n");
    body.push_str("Thank you!");
    body
}

fn build_message(from: &str, user: &User, counts: &[(TaskStatus, i64)]) -> Message {
    Message {
        from: from.to_string(),
        to: user.email.clone(),
        subject: SUBJECT.to_string(),
        body: compose_summary(&user.username, counts),
    }
}

/// One scheduler pass: find due users, send each a summary, advance
/// last_sent on success. A failure for one user is logged and does not
/// block the rest of the batch.
pub async fn run_due_reminders(
    db: &Database,
    transport: &dyn MailTransport,
    config: &ReminderConfig,
) -> Result<RunSummary> {
    let now = now_ms();
    let resend_after_ms = config.resend_after_hours * 3_600_000;
    let due = db.due_reminders(now, resend_after_ms)?;

    let mut summary = RunSummary {
        matched: due.len(),
        ..Default::default()
    };

    if due.is_empty() {
        debug!("no users due for reminders");
        return Ok(summary);
    }

    for (user, _prefs) in due {
        let counts = match db.status_counts(user.id) {
            Ok(counts) => counts,
            Err(e) => {
                warn!(user = %user.username, "failed to load task counts: {e}");
                summary.failed += 1;
                continue;
            }
        };

        let message = build_message(&config.from_address, &user, &counts);
        match transport.send(&message).await {
            Ok(()) => {
                db.mark_reminder_sent(user.id, now_ms())?;
                summary.sent += 1;
            }
            Err(e) => {
                warn!(user = %user.username, "failed to send reminder: {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        matched = summary.matched,
        sent = summary.sent,
        failed = summary.failed,
        "reminder pass complete"
    );

    Ok(summary)
}

/// Spawn the fixed-interval scheduler loop.
///
/// Returns the task handle and a sender that stops the loop when fired.
pub fn start_scheduler(
    db: Arc<Database>,
    transport: Arc<dyn MailTransport>,
    config: ReminderConfig,
) -> (JoinHandle<()>, oneshot::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds));
        // The first tick fires immediately; skip straight into the cadence.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = run_due_reminders(&db, transport.as_ref(), &config).await {
                        warn!("reminder pass failed: {e}");
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("reminder scheduler shutting down");
                    break;
                }
            }
        }
    });

    (handle, shutdown_tx)
}

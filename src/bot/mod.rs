//! Telegram bot module - remote student check-in with daily reminders

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use teloxide::{prelude::*, types::ChatId, utils::command::BotCommands};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::attendance::AttendanceLog;
use crate::db::{CheckinOutcome, Database, Profile, Role};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Subscribers = Arc<Mutex<HashSet<ChatId>>>;

/// Reminder interval (24 hours)
const REMINDER_INTERVAL_SECS: u64 = 24 * 3600;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Rugido commands:")]
pub enum Command {
    #[command(description = "Start")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Link this chat to your student email")]
    Iam(String),
    #[command(description = "Check in for today's workout")]
    Checkin,
    #[command(description = "Current streak")]
    Streak,
    #[command(description = "This month's attendance")]
    Month,
    #[command(description = "This week's attendance")]
    Week,
    #[command(description = "Enable daily reminders")]
    Remind,
    #[command(description = "Disable reminders")]
    Stop,
}

/// Background task that nudges subscribers to train
async fn reminder_task(bot: Bot, subscribers: Subscribers) {
    info!("Reminder task started (interval: {} seconds)", REMINDER_INTERVAL_SECS);

    loop {
        tokio::time::sleep(Duration::from_secs(REMINDER_INTERVAL_SECS)).await;

        let subs = subscribers.lock().await;
        if subs.is_empty() {
            continue;
        }

        info!("Sending reminders to {} subscribers", subs.len());

        for chat_id in subs.iter() {
            let result = bot
                .send_message(*chat_id, "Time to train! Send /checkin when you finish.")
                .await;

            if let Err(e) = result {
                error!("Failed to send reminder to {}: {}", chat_id, e);
            }
        }
    }
}

/// Start the Telegram bot with reminders
pub async fn run_bot(token: String, db_path: &str) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    let db = Arc::new(Mutex::new(Database::open(db_path)?));
    let subscribers: Subscribers = Arc::new(Mutex::new(HashSet::new()));

    // Start reminder background task
    let reminder_bot = bot.clone();
    let reminder_subs = subscribers.clone();
    tokio::spawn(async move {
        reminder_task(reminder_bot, reminder_subs).await;
    });

    let handler = dptree::entry().branch(
        Update::filter_message()
            .filter_command::<Command>()
            .endpoint(handle_command),
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![db, subscribers])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Hand back the student linked to this chat, or tell them to /iam first.
///
/// The caller does the `user_by_chat` lookup; taking `&Database` here
/// would hold a `!Send` borrow across the reply await.
async fn linked_student(
    bot: &Bot,
    msg: &Message,
    found: Option<Profile>,
) -> Result<Option<Profile>, Box<dyn std::error::Error + Send + Sync>> {
    match found {
        Some(profile) => Ok(Some(profile)),
        None => {
            bot.send_message(
                msg.chat.id,
                "This chat is not linked yet. Send /iam your@email.com first.",
            )
            .await?;
            Ok(None)
        }
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    db: Arc<Mutex<Database>>,
    subscribers: Subscribers,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let text = "Rugido gym tracker\n\n\
                /iam email - link this chat to your profile\n\
                /checkin - register today's workout\n\
                /streak - current streak\n\
                /month - this month's attendance\n\
                /week - this week's attendance\n\
                /remind - daily reminders\n\
                /stop - disable reminders";
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }

        Command::Iam(email) => {
            let email = email.trim();
            if email.is_empty() {
                bot.send_message(msg.chat.id, "Usage: /iam your@email.com").await?;
                return Ok(());
            }

            let db = db.lock().await;
            match db.user_by_email(email)? {
                Some(profile) if profile.role == Role::Student => {
                    if let Some(user_id) = profile.id {
                        db.link_telegram(msg.chat.id.0, user_id)?;
                        bot.send_message(
                            msg.chat.id,
                            format!("Linked! Welcome, {}.", profile.name),
                        )
                        .await?;
                        info!("Chat {} linked to student {}", msg.chat.id, user_id);
                    }
                }
                Some(_) => {
                    bot.send_message(msg.chat.id, "Only student profiles can use the bot.")
                        .await?;
                }
                None => {
                    bot.send_message(msg.chat.id, "No profile with that email.").await?;
                }
            }
        }

        Command::Checkin => {
            let db = db.lock().await;
            let Some(student) = linked_student(&bot, &msg, db.user_by_chat(msg.chat.id.0)?).await? else {
                return Ok(());
            };
            let Some(user_id) = student.id else {
                return Ok(());
            };

            let today = Local::now().date_naive();
            let outcome = db.check_in(user_id, None, today)?;

            let text = match outcome {
                CheckinOutcome::Recorded => {
                    let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
                    let streak = log.current_streak(Local::now().naive_local());
                    format!("Check-in recorded! Streak: {} days", streak)
                }
                CheckinOutcome::AlreadyCheckedIn => "Already trained today!".to_string(),
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Streak => {
            let db = db.lock().await;
            let Some(student) = linked_student(&bot, &msg, db.user_by_chat(msg.chat.id.0)?).await? else {
                return Ok(());
            };
            let Some(user_id) = student.id else {
                return Ok(());
            };

            let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
            let streak = log.current_streak(Local::now().naive_local());
            bot.send_message(msg.chat.id, format!("Current streak: {} days", streak))
                .await?;
        }

        Command::Month => {
            let db = db.lock().await;
            let Some(student) = linked_student(&bot, &msg, db.user_by_chat(msg.chat.id.0)?).await? else {
                return Ok(());
            };
            let Some(user_id) = student.id else {
                return Ok(());
            };

            let today = Local::now().date_naive();
            let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
            let view = log.month_view(today.year(), today.month());

            let days: Vec<String> = view
                .days_with_attendance
                .iter()
                .map(|d| d.to_string())
                .collect();
            let text = if days.is_empty() {
                "No check-ins this month yet.".to_string()
            } else {
                format!(
                    "{} check-ins this month: days {}",
                    view.total_count(),
                    days.join(", ")
                )
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Week => {
            let db = db.lock().await;
            let Some(student) = linked_student(&bot, &msg, db.user_by_chat(msg.chat.id.0)?).await? else {
                return Ok(());
            };
            let Some(user_id) = student.id else {
                return Ok(());
            };

            let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
            let completed: BTreeSet<u32> = log.week_completion(Local::now().naive_local());

            let text = if completed.is_empty() {
                "No check-ins this week yet.".to_string()
            } else {
                let labels: Vec<&str> = completed
                    .iter()
                    .map(|i| WEEKDAY_LABELS[*i as usize % 7])
                    .collect();
                format!("Trained this week: {}", labels.join(", "))
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Remind => {
            let mut subs = subscribers.lock().await;
            subs.insert(msg.chat.id);
            let count = subs.len();

            bot.send_message(
                msg.chat.id,
                format!(
                    "Reminders on! I'll nudge you once a day.\n\
                    /stop - disable\n\n\
                    Active subscribers: {}",
                    count
                ),
            )
            .await?;

            info!("User {} subscribed to reminders", msg.chat.id);
        }

        Command::Stop => {
            let mut subs = subscribers.lock().await;
            let was_subscribed = subs.remove(&msg.chat.id);

            if was_subscribed {
                bot.send_message(msg.chat.id, "Reminders off.\n\n/remind - enable again")
                    .await?;
                info!("User {} unsubscribed from reminders", msg.chat.id);
            } else {
                bot.send_message(msg.chat.id, "Reminders were already off.\n\n/remind - enable")
                    .await?;
            }
        }
    }

    Ok(())
}

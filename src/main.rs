//! rugido - Gym management tracker
//!
//! Attendance calendar and streaks, workout templates, monthly charges.

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};

use rugido::attendance::{days_in_month, first_weekday_of_month, AttendanceLog};
use rugido::db::{Database, Profile, Role};
use rugido::tui::App;

const DB_PATH: &str = "rugido.db";

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Parser)]
#[command(name = "rugido")]
#[command(author, version, about = "Rugido - gym management tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the attendance calendar TUI for a student
    Tui {
        /// Student email
        email: String,
    },

    /// Create a user (admin, professor or student)
    CreateUser {
        /// Full name
        name: String,

        /// Email, unique
        email: String,

        /// Role: admin, professor or student
        #[arg(short, long, default_value = "student")]
        role: String,

        /// Email of the professor this student is assigned to
        #[arg(short, long)]
        professor: Option<String>,
    },

    /// List users
    Users {
        /// Filter by role: admin, professor or student
        role: Option<String>,
    },

    /// Students assigned to a professor
    MyStudents {
        /// Professor email
        email: String,
    },

    /// Delete a user and all their records
    DeleteUser {
        /// User email
        email: String,
    },

    /// Register today's check-in for a student
    Checkin {
        /// Student email
        email: String,

        /// Workout id the check-in refers to
        #[arg(short, long)]
        workout: Option<i64>,
    },

    /// Print the attendance calendar and streak for a student
    Calendar {
        /// Student email
        email: String,

        /// Year to show (defaults to current)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month to show, 1-12 (defaults to current)
        #[arg(short, long)]
        month: Option<u32>,
    },

    /// Show which days of the current week a student trained
    Week {
        /// Student email
        email: String,
    },

    /// Create a workout template in the library
    CreateTemplate {
        /// Template name
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Owning professor's email
        #[arg(short, long)]
        professor: Option<String>,
    },

    /// List the template library
    Templates,

    /// Add an exercise to a workout
    AddExercise {
        /// Workout id
        workout: i64,

        /// Exercise name
        name: String,

        /// Number of sets
        #[arg(short, long, default_value = "3")]
        sets: i32,

        /// Reps per set
        #[arg(short, long, default_value = "10")]
        reps: i32,

        /// Execution notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Clone a template and its exercises to a student
    CloneWorkout {
        /// Template id
        template: i64,

        /// Student email
        email: String,
    },

    /// Delete a workout and its exercise list
    DeleteWorkout {
        /// Workout id
        workout: i64,
    },

    /// Remove an exercise from a workout
    DeleteExercise {
        /// Exercise id
        exercise: i64,
    },

    /// List a student's workouts with their exercises
    Workouts {
        /// Student email
        email: String,
    },

    /// Import check-ins for a student from a JSON file of RFC 3339
    /// timestamps (an export from a turnstile or a previous system)
    ImportCheckins {
        /// Student email
        email: String,

        /// Path to the JSON file
        file: String,
    },

    /// Create a charge for a student
    Charge {
        /// Student email
        email: String,

        /// Amount in euros, e.g. 49.90
        amount: f64,

        /// Due date (YYYY-MM-DD)
        due: NaiveDate,

        /// Billing month (YYYY-MM, defaults to the due date's month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Mark a charge as paid today
    Pay {
        /// Payment id
        payment: i64,
    },

    /// Create this month's charge for every student at once
    GenerateCharges {
        /// Amount in euros
        amount: f64,

        /// Due date (YYYY-MM-DD)
        due: NaiveDate,
    },

    /// List payments, all of them or one student's ledger
    Payments {
        /// Student email to filter by
        email: Option<String>,
    },

    /// Show the admin dashboard counters
    Stats {
        /// Emit the counters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start Telegram bot
    Bot {
        /// Telegram bot token (or set TELOXIDE_TOKEN env var)
        #[arg(short, long, env = "TELOXIDE_TOKEN")]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut db = Database::open(DB_PATH)?;

    match cli.command {
        Some(Commands::Tui { email }) => {
            let mut app = App::new(db, &email)?;
            app.run()?;
        }

        Some(Commands::CreateUser { name, email, role, professor }) => {
            let role = Role::parse(&role)?;
            let professor_id = match professor {
                Some(prof_email) => Some(require_user(&db, &prof_email, Role::Professor)?),
                None => None,
            };

            let id = db.create_user(&Profile {
                id: None,
                name: name.clone(),
                email,
                role,
                professor_id,
            })?;
            println!("Created {} '{}' (id: {})", role.as_str(), name, id);
        }

        Some(Commands::Users { role }) => {
            let role = role.map(|r| Role::parse(&r)).transpose()?;
            let users = db.list_users(role)?;
            println!("{:<5} {:<25} {:<30} {}", "id", "name", "email", "role");
            println!("{:-<75}", "");
            for u in users {
                println!(
                    "{:<5} {:<25} {:<30} {}",
                    u.id.unwrap_or_default(),
                    u.name,
                    u.email,
                    u.role.as_str()
                );
            }
        }

        Some(Commands::MyStudents { email }) => {
            let prof_id = require_user(&db, &email, Role::Professor)?;
            let students = db.students_of_professor(prof_id)?;
            if students.is_empty() {
                println!("No students assigned.");
            }
            for s in students {
                println!("{:<5} {:<25} {}", s.id.unwrap_or_default(), s.name, s.email);
            }
        }

        Some(Commands::DeleteUser { email }) => {
            let user = db
                .user_by_email(&email)?
                .ok_or_else(|| anyhow!("no user with email {}", email))?;
            let user_id = user.id.ok_or_else(|| anyhow!("user {} has no id", email))?;
            db.delete_user(user_id)?;
            println!("Deleted {} '{}' and their records.", user.role.as_str(), user.name);
        }

        Some(Commands::Checkin { email, workout }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let today = Local::now().date_naive();

            match db.check_in(user_id, workout, today)? {
                rugido::db::CheckinOutcome::Recorded => {
                    let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
                    let streak = log.current_streak(Local::now().naive_local());
                    println!("Check-in recorded for {}. Streak: {} days", today, streak);
                }
                rugido::db::CheckinOutcome::AlreadyCheckedIn => {
                    println!("Already checked in today.");
                }
            }
        }

        Some(Commands::Calendar { email, year, month }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let now = Local::now().naive_local();
            let year = year.unwrap_or_else(|| now.date().year());
            let month = month.unwrap_or_else(|| now.date().month());
            if !(1..=12).contains(&month) {
                bail!("month must be 1-12");
            }

            let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
            let view = log.month_view(year, month);
            let streak = log.current_streak(now);

            println!("Attendance {:04}-{:02}", year, month);
            println!("Check-ins: {}   Streak: {} days", view.total_count(), streak);
            println!();
            print_month_grid(year, month, &view.days_with_attendance);
        }

        Some(Commands::Week { email }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let log = AttendanceLog::from_days(db.attendance_days(user_id)?);
            let completed = log.week_completion(Local::now().naive_local());

            for (i, label) in WEEKDAY_LABELS.iter().enumerate() {
                let mark = if completed.contains(&(i as u32)) { "x" } else { "." };
                print!("{} {}  ", label, mark);
            }
            println!();
        }

        Some(Commands::CreateTemplate { name, description, professor }) => {
            let professor_id = match professor {
                Some(prof_email) => Some(require_user(&db, &prof_email, Role::Professor)?),
                None => None,
            };
            let id = db.create_template(&name, description.as_deref(), professor_id)?;
            println!("Created template '{}' (id: {})", name, id);
        }

        Some(Commands::Templates) => {
            let templates = db.list_templates()?;
            if templates.is_empty() {
                println!("Library is empty.");
            }
            for t in templates {
                println!(
                    "{:<5} {:<30} {}",
                    t.id.unwrap_or_default(),
                    t.name,
                    t.description.as_deref().unwrap_or("-")
                );
            }
        }

        Some(Commands::AddExercise { workout, name, sets, reps, notes }) => {
            let id = db.add_exercise(workout, &name, sets, reps, notes.as_deref())?;
            println!("Added '{}' {}x{} to workout {} (id: {})", name, sets, reps, workout, id);
        }

        Some(Commands::CloneWorkout { template, email }) => {
            let student_id = require_user(&db, &email, Role::Student)?;
            let new_id = db.clone_template_to_student(template, student_id)?;
            println!("Cloned template {} to {} (new workout id: {})", template, email, new_id);
        }

        Some(Commands::DeleteWorkout { workout }) => {
            db.delete_workout(workout)?;
            println!("Deleted workout {}.", workout);
        }

        Some(Commands::DeleteExercise { exercise }) => {
            db.delete_exercise(exercise)?;
            println!("Deleted exercise {}.", exercise);
        }

        Some(Commands::Workouts { email }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let workouts = db.student_workouts(user_id)?;
            if workouts.is_empty() {
                println!("No workouts assigned.");
            }
            for w in workouts {
                println!("{} (id: {})", w.name, w.id.unwrap_or_default());
                if let Some(id) = w.id {
                    for ex in db.workout_exercises(id)? {
                        println!(
                            "  {}x{} {} {}",
                            ex.sets,
                            ex.reps,
                            ex.name,
                            ex.notes.as_deref().unwrap_or("")
                        );
                    }
                }
            }
        }

        Some(Commands::ImportCheckins { email, file }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let raw = std::fs::read_to_string(&file)?;
            let instants: Vec<chrono::DateTime<chrono::Utc>> = serde_json::from_str(&raw)?;

            let offset = *Local::now().offset();
            let log = AttendanceLog::from_timestamps(&instants, offset);

            let mut imported = 0;
            for day in log.days() {
                if db.check_in(user_id, None, day)? == rugido::db::CheckinOutcome::Recorded {
                    imported += 1;
                }
            }
            println!(
                "{} timestamps covering {} days; {} new check-ins for {}.",
                instants.len(),
                log.total_days(),
                imported,
                email
            );
        }

        Some(Commands::Charge { email, amount, due, month }) => {
            let user_id = require_user(&db, &email, Role::Student)?;
            let reference_month = month.unwrap_or_else(|| due.format("%Y-%m").to_string());
            let id = db.create_charge(user_id, to_cents(amount), due, &reference_month)?;
            println!(
                "Charge of {:.2} for {} due {} (id: {})",
                amount, email, due, id
            );
        }

        Some(Commands::Pay { payment }) => {
            db.mark_paid(payment, Local::now().date_naive())?;
            println!("Payment {} marked as paid.", payment);
        }

        Some(Commands::GenerateCharges { amount, due }) => {
            let reference_month = due.format("%Y-%m").to_string();
            let created = db.generate_monthly_charges(to_cents(amount), due, &reference_month)?;
            println!("Created {} charges for {}.", created, reference_month);
        }

        Some(Commands::Payments { email }) => {
            let user_id = match email {
                Some(email) => Some(require_user(&db, &email, Role::Student)?),
                None => None,
            };
            let payments = db.list_payments(user_id)?;
            println!(
                "{:<5} {:<8} {:>9} {:<12} {:<9} {}",
                "id", "user", "amount", "due", "month", "status"
            );
            println!("{:-<55}", "");
            for p in payments {
                println!(
                    "{:<5} {:<8} {:>9.2} {:<12} {:<9} {}",
                    p.id.unwrap_or_default(),
                    p.user_id,
                    p.amount_cents as f64 / 100.0,
                    p.due_date,
                    p.reference_month,
                    p.status.as_str()
                );
            }
        }

        Some(Commands::Stats { json }) => {
            let stats = db.dashboard_stats(Local::now().date_naive())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Rugido dashboard");
                println!("{:-<40}", "");
                println!("Students:         {}", stats.students);
                println!("Professors:       {}", stats.professors);
                println!("Check-ins today:  {}", stats.checkins_today);
                println!("Pending payments: {}", stats.pending_payments);
            }
        }

        Some(Commands::Bot { token }) => {
            println!("Starting Telegram bot...");
            println!("Database: {}", DB_PATH);
            rugido::bot::run_bot(token, DB_PATH).await?;
        }

        None => {
            println!("Run with --help to see available commands.");
        }
    }

    Ok(())
}

/// Look up a user by email and insist on the expected role.
fn require_user(db: &Database, email: &str, role: Role) -> Result<i64> {
    let user = db
        .user_by_email(email)?
        .ok_or_else(|| anyhow!("no user with email {}", email))?;
    if user.role != role {
        bail!("{} is a {}, expected a {}", email, user.role.as_str(), role.as_str());
    }
    user.id.ok_or_else(|| anyhow!("user {} has no id", email))
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Print a month as a Sunday-first grid, marking checked-in days.
fn print_month_grid(year: i32, month: u32, checked: &std::collections::BTreeSet<u32>) {
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");

    let mut cells = 0;
    for _ in 0..first_weekday_of_month(year, month) {
        print!("    ");
        cells += 1;
    }

    for day in 1..=days_in_month(year, month) {
        if checked.contains(&day) {
            print!("[{:>2}]", day);
        } else {
            print!(" {:>2} ", day);
        }
        cells += 1;
        if cells % 7 == 0 {
            println!();
        }
    }
    if cells % 7 != 0 {
        println!();
    }
}

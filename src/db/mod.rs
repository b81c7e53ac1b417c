//! Database module - SQLite storage for gym data
//!
//! Profiles, check-ins, workouts and payments. Derived views (calendar,
//! streak) live in the attendance module; this layer only stores and
//! fetches the raw records.

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// User role within the gym.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Admin,
    Professor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Professor => "professor",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "professor" => Ok(Role::Professor),
            "student" => Ok(Role::Student),
            other => bail!("unknown role: {}", other),
        }
    }
}

/// Gym member profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Professor this student is assigned to (students only)
    pub professor_id: Option<i64>,
}

/// Workout definition - a template from the library or a copy assigned
/// to a specific student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub professor_id: Option<i64>,
    /// Student this workout belongs to; templates have none
    pub user_id: Option<i64>,
    pub is_template: bool,
}

/// Exercise line inside a workout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub id: Option<i64>,
    pub workout_id: i64,
    pub name: String,
    pub sets: i32,
    pub reps: i32,
    pub position: i32,
    pub notes: Option<String>,
}

/// Monthly charge for a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Option<i64>,
    pub user_id: i64,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    /// Billing month in YYYY-MM form
    pub reference_month: String,
    pub status: PaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => bail!("unknown payment status: {}", other),
        }
    }
}

/// Result of a check-in attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinOutcome {
    /// New check-in recorded for the day
    Recorded,
    /// Student had already checked in that day
    AlreadyCheckedIn,
}

/// Headline numbers for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub students: i64,
    pub professors: i64,
    pub checkins_today: i64,
    pub pending_payments: i64,
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                professor_id INTEGER REFERENCES profiles(id),
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                professor_id INTEGER REFERENCES profiles(id),
                user_id INTEGER REFERENCES profiles(id),
                is_template INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES profiles(id),
                workout_id INTEGER REFERENCES workouts(id),
                checkin_date TEXT NOT NULL,
                UNIQUE(user_id, checkin_date)
            );
            CREATE TABLE IF NOT EXISTS workout_exercises (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id INTEGER NOT NULL REFERENCES workouts(id),
                name TEXT NOT NULL,
                sets INTEGER NOT NULL,
                reps INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                notes TEXT
            );
            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES profiles(id),
                amount_cents INTEGER NOT NULL,
                due_date TEXT NOT NULL,
                reference_month TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                payment_date TEXT
            );
            CREATE TABLE IF NOT EXISTS telegram_links (
                chat_id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES profiles(id)
            );",
        )?;

        Ok(())
    }

    // --- profiles ---

    /// Create a new user profile
    pub fn create_user(&self, profile: &Profile) -> Result<i64> {
        if profile.professor_id.is_some() && profile.role != Role::Student {
            bail!("only students can be assigned to a professor");
        }

        self.conn.execute(
            "INSERT INTO profiles (name, email, role, professor_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.name,
                profile.email,
                profile.role.as_str(),
                profile.professor_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, name, email, role, professor_id FROM profiles WHERE id = ?1",
                params![id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, name, email, role, professor_id FROM profiles WHERE email = ?1",
                params![email],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// List users, optionally filtered by role, ordered by name
    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<Profile>> {
        let mut out = Vec::new();
        match role {
            Some(role) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, name, email, role, professor_id FROM profiles WHERE role = ?1 ORDER BY name ASC",
                )?;
                let rows = stmt.query_map(params![role.as_str()], row_to_profile)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, name, email, role, professor_id FROM profiles ORDER BY name ASC",
                )?;
                let rows = stmt.query_map([], row_to_profile)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Delete a user and everything hanging off them: assigned workouts
    /// with their exercises, check-ins, charges and the Telegram link.
    /// A departing professor's students and library templates are kept,
    /// just unassigned.
    pub fn delete_user(&mut self, user_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        let role: Option<String> = tx
            .query_row(
                "SELECT role FROM profiles WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(role) = role else {
            bail!("user {} not found", user_id);
        };

        if role == "professor" {
            tx.execute(
                "UPDATE profiles SET professor_id = NULL WHERE professor_id = ?1",
                params![user_id],
            )?;
            tx.execute(
                "UPDATE workouts SET professor_id = NULL WHERE professor_id = ?1",
                params![user_id],
            )?;
        }

        tx.execute(
            "DELETE FROM workout_exercises WHERE workout_id IN
                 (SELECT id FROM workouts WHERE user_id = ?1)",
            params![user_id],
        )?;
        tx.execute("DELETE FROM workouts WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM attendance WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM payments WHERE user_id = ?1", params![user_id])?;
        tx.execute(
            "DELETE FROM telegram_links WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute("DELETE FROM profiles WHERE id = ?1", params![user_id])?;

        tx.commit()?;
        Ok(())
    }

    /// Students assigned to the given professor
    pub fn students_of_professor(&self, professor_id: i64) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, role, professor_id FROM profiles
             WHERE role = 'student' AND professor_id = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![professor_id], row_to_profile)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // --- attendance ---

    /// Record a check-in for the day, refusing duplicates so the same day
    /// never counts twice on the calendar
    pub fn check_in(
        &self,
        user_id: i64,
        workout_id: Option<i64>,
        day: NaiveDate,
    ) -> Result<CheckinOutcome> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM attendance WHERE user_id = ?1 AND checkin_date = ?2",
                params![user_id, day.format("%Y-%m-%d").to_string()],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Ok(CheckinOutcome::AlreadyCheckedIn);
        }

        self.conn.execute(
            "INSERT INTO attendance (user_id, workout_id, checkin_date) VALUES (?1, ?2, ?3)",
            params![user_id, workout_id, day.format("%Y-%m-%d").to_string()],
        )?;
        Ok(CheckinOutcome::Recorded)
    }

    /// All check-in days for a student, most recent first
    pub fn attendance_days(&self, user_id: i64) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT checkin_date FROM attendance WHERE user_id = ?1 ORDER BY checkin_date DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut days = Vec::new();
        for row in rows {
            let raw = row?;
            let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| anyhow!("bad checkin_date {:?}: {}", raw, e))?;
            days.push(day);
        }
        Ok(days)
    }

    // --- workouts ---

    /// Create a template workout in the library
    pub fn create_template(
        &self,
        name: &str,
        description: Option<&str>,
        professor_id: Option<i64>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO workouts (name, description, professor_id, user_id, is_template, created_at)
             VALUES (?1, ?2, ?3, NULL, 1, ?4)",
            params![name, description, professor_id, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Template workouts, newest first
    pub fn list_templates(&self) -> Result<Vec<Workout>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, professor_id, user_id, is_template FROM workouts
             WHERE is_template = 1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_workout)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Add an exercise at the end of a workout
    pub fn add_exercise(
        &self,
        workout_id: i64,
        name: &str,
        sets: i32,
        reps: i32,
        notes: Option<&str>,
    ) -> Result<i64> {
        let next_position: i32 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM workout_exercises WHERE workout_id = ?1",
            params![workout_id],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "INSERT INTO workout_exercises (workout_id, name, sets, reps, position, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![workout_id, name, sets, reps, next_position, notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Exercises of a workout in display order
    pub fn workout_exercises(&self, workout_id: i64) -> Result<Vec<WorkoutExercise>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workout_id, name, sets, reps, position, notes FROM workout_exercises
             WHERE workout_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![workout_id], |row| {
            Ok(WorkoutExercise {
                id: Some(row.get(0)?),
                workout_id: row.get(1)?,
                name: row.get(2)?,
                sets: row.get(3)?,
                reps: row.get(4)?,
                position: row.get(5)?,
                notes: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Workouts assigned to a student, newest first
    pub fn student_workouts(&self, user_id: i64) -> Result<Vec<Workout>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, professor_id, user_id, is_template FROM workouts
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_workout)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Clone a template and its exercise list to a student, atomically.
    /// Returns the id of the new workout.
    pub fn clone_template_to_student(&mut self, template_id: i64, student_id: i64) -> Result<i64> {
        let tx = self.conn.transaction()?;

        let template = tx
            .query_row(
                "SELECT id, name, description, professor_id, user_id, is_template FROM workouts
                 WHERE id = ?1 AND is_template = 1",
                params![template_id],
                row_to_workout,
            )
            .optional()?
            .ok_or_else(|| anyhow!("template {} not found", template_id))?;

        let student_role: Option<String> = tx
            .query_row(
                "SELECT role FROM profiles WHERE id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;
        match student_role.as_deref() {
            Some("student") => {}
            Some(other) => bail!("user {} is a {}, not a student", student_id, other),
            None => bail!("student {} not found", student_id),
        }

        tx.execute(
            "INSERT INTO workouts (name, description, professor_id, user_id, is_template, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                template.name,
                template.description,
                template.professor_id,
                student_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let new_workout_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO workout_exercises (workout_id, name, sets, reps, position, notes)
             SELECT ?1, name, sets, reps, position, notes FROM workout_exercises
             WHERE workout_id = ?2 ORDER BY position ASC",
            params![new_workout_id, template_id],
        )?;

        tx.commit()?;
        Ok(new_workout_id)
    }

    /// Delete a workout and its exercise list, atomically. Check-ins that
    /// pointed at it keep their day but lose the workout reference.
    pub fn delete_workout(&mut self, workout_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM workouts WHERE id = ?1",
                params![workout_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            bail!("workout {} not found", workout_id);
        }

        tx.execute(
            "UPDATE attendance SET workout_id = NULL WHERE workout_id = ?1",
            params![workout_id],
        )?;
        tx.execute(
            "DELETE FROM workout_exercises WHERE workout_id = ?1",
            params![workout_id],
        )?;
        tx.execute("DELETE FROM workouts WHERE id = ?1", params![workout_id])?;

        tx.commit()?;
        Ok(())
    }

    /// Remove a single exercise from a workout
    pub fn delete_exercise(&self, exercise_id: i64) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM workout_exercises WHERE id = ?1",
            params![exercise_id],
        )?;
        if deleted == 0 {
            bail!("exercise {} not found", exercise_id);
        }
        Ok(())
    }

    // --- payments ---

    /// Create a single charge for a student
    pub fn create_charge(
        &self,
        user_id: i64,
        amount_cents: i64,
        due_date: NaiveDate,
        reference_month: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO payments (user_id, amount_cents, due_date, reference_month, status)
             VALUES (?1, ?2, ?3, ?4, 'pending')",
            params![
                user_id,
                amount_cents,
                due_date.format("%Y-%m-%d").to_string(),
                reference_month,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Mark a charge as paid on the given day. Errors if the charge does
    /// not exist.
    pub fn mark_paid(&self, payment_id: i64, paid_on: NaiveDate) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE payments SET status = 'paid', payment_date = ?2 WHERE id = ?1",
            params![payment_id, paid_on.format("%Y-%m-%d").to_string()],
        )?;
        if updated == 0 {
            bail!("payment {} not found", payment_id);
        }
        Ok(())
    }

    /// Create the month's charge for every student at once, skipping
    /// students already charged for that reference month. Returns how
    /// many charges were created.
    pub fn generate_monthly_charges(
        &mut self,
        amount_cents: i64,
        due_date: NaiveDate,
        reference_month: &str,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let created = tx.execute(
            "INSERT INTO payments (user_id, amount_cents, due_date, reference_month, status)
             SELECT p.id, ?1, ?2, ?3, 'pending' FROM profiles p
             WHERE p.role = 'student'
               AND NOT EXISTS (
                   SELECT 1 FROM payments pay
                   WHERE pay.user_id = p.id AND pay.reference_month = ?3
               )",
            params![
                amount_cents,
                due_date.format("%Y-%m-%d").to_string(),
                reference_month,
            ],
        )?;

        tx.commit()?;
        Ok(created)
    }

    /// Payments, most recent due date first, optionally restricted to one
    /// student's ledger
    pub fn list_payments(&self, user_id: Option<i64>) -> Result<Vec<Payment>> {
        let row_to_tuple = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        };

        let mut raw = Vec::new();
        match user_id {
            Some(user_id) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, amount_cents, due_date, reference_month, status, payment_date
                     FROM payments WHERE user_id = ?1 ORDER BY due_date DESC",
                )?;
                let rows = stmt.query_map(params![user_id], row_to_tuple)?;
                for row in rows {
                    raw.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, user_id, amount_cents, due_date, reference_month, status, payment_date
                     FROM payments ORDER BY due_date DESC",
                )?;
                let rows = stmt.query_map([], row_to_tuple)?;
                for row in rows {
                    raw.push(row?);
                }
            }
        }

        let mut out = Vec::new();
        for row in raw {
            let (id, user_id, amount_cents, due, reference_month, status, paid) = row;
            out.push(Payment {
                id: Some(id),
                user_id,
                amount_cents,
                due_date: NaiveDate::parse_from_str(&due, "%Y-%m-%d")
                    .map_err(|e| anyhow!("bad due_date {:?}: {}", due, e))?,
                reference_month,
                status: PaymentStatus::parse(&status)?,
                payment_date: paid
                    .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                    .transpose()?,
            });
        }
        Ok(out)
    }

    // --- dashboard ---

    /// Headline counts for the admin dashboard
    pub fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats> {
        let students: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profiles WHERE role = 'student'",
            [],
            |row| row.get(0),
        )?;
        let professors: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profiles WHERE role = 'professor'",
            [],
            |row| row.get(0),
        )?;
        let checkins_today: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE checkin_date = ?1",
            params![today.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )?;
        let pending_payments: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;

        Ok(DashboardStats {
            students,
            professors,
            checkins_today,
            pending_payments,
        })
    }

    // --- telegram ---

    /// Link a Telegram chat to a profile, replacing any previous link
    pub fn link_telegram(&self, chat_id: i64, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO telegram_links (chat_id, user_id) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET user_id = excluded.user_id",
            params![chat_id, user_id],
        )?;
        Ok(())
    }

    /// Profile linked to a Telegram chat, if any
    pub fn user_by_chat(&self, chat_id: i64) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT p.id, p.name, p.email, p.role, p.professor_id
                 FROM telegram_links t JOIN profiles p ON p.id = t.user_id
                 WHERE t.chat_id = ?1",
                params![chat_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let role_str: String = row.get(3)?;
    let role = Role::parse(&role_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Profile {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role,
        professor_id: row.get(4)?,
    })
}

fn row_to_workout(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workout> {
    Ok(Workout {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        professor_id: row.get(3)?,
        user_id: row.get(4)?,
        is_template: row.get::<_, i64>(5)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_student(db: &Database, name: &str, email: &str) -> i64 {
        db.create_user(&Profile {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Student,
            professor_id: None,
        })
        .unwrap()
    }

    fn add_professor(db: &Database, name: &str, email: &str) -> i64 {
        db.create_user(&Profile {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Professor,
            professor_id: None,
        })
        .unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_create_and_find_user() {
        let db = test_db();
        let id = add_student(&db, "Ana", "ana@rugido.gym");

        let found = db.user_by_email("ana@rugido.gym").unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.role, Role::Student);
        assert!(db.user_by_email("nope@rugido.gym").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = test_db();
        add_student(&db, "Ana", "ana@rugido.gym");
        let dup = db.create_user(&Profile {
            id: None,
            name: "Ana 2".to_string(),
            email: "ana@rugido.gym".to_string(),
            role: Role::Student,
            professor_id: None,
        });
        assert!(dup.is_err());
    }

    #[test]
    fn test_professor_assignment_requires_student() {
        let db = test_db();
        let bad = db.create_user(&Profile {
            id: None,
            name: "Bruno".to_string(),
            email: "bruno@rugido.gym".to_string(),
            role: Role::Professor,
            professor_id: Some(1),
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_list_users_by_role() {
        let db = test_db();
        add_student(&db, "Ana", "ana@rugido.gym");
        add_professor(&db, "Bruno", "bruno@rugido.gym");

        assert_eq!(db.list_users(Some(Role::Student)).unwrap().len(), 1);
        assert_eq!(db.list_users(Some(Role::Professor)).unwrap().len(), 1);
        assert_eq!(db.list_users(None).unwrap().len(), 2);
    }

    #[test]
    fn test_students_of_professor() {
        let db = test_db();
        let prof = add_professor(&db, "Bruno", "bruno@rugido.gym");
        db.create_user(&Profile {
            id: None,
            name: "Ana".to_string(),
            email: "ana@rugido.gym".to_string(),
            role: Role::Student,
            professor_id: Some(prof),
        })
        .unwrap();
        add_student(&db, "Carla", "carla@rugido.gym");

        let mine = db.students_of_professor(prof).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Ana");
    }

    #[test]
    fn test_check_in_rejects_same_day() {
        let db = test_db();
        let id = add_student(&db, "Ana", "ana@rugido.gym");

        let first = db.check_in(id, None, day("2024-03-10")).unwrap();
        let second = db.check_in(id, None, day("2024-03-10")).unwrap();
        assert_eq!(first, CheckinOutcome::Recorded);
        assert_eq!(second, CheckinOutcome::AlreadyCheckedIn);
        assert_eq!(db.attendance_days(id).unwrap().len(), 1);
    }

    #[test]
    fn test_attendance_days_most_recent_first() {
        let db = test_db();
        let id = add_student(&db, "Ana", "ana@rugido.gym");
        db.check_in(id, None, day("2024-03-09")).unwrap();
        db.check_in(id, None, day("2024-03-11")).unwrap();
        db.check_in(id, None, day("2024-03-10")).unwrap();

        let days = db.attendance_days(id).unwrap();
        assert_eq!(
            days,
            vec![day("2024-03-11"), day("2024-03-10"), day("2024-03-09")]
        );
    }

    #[test]
    fn test_clone_template_copies_exercises() {
        let mut db = test_db();
        let student = add_student(&db, "Ana", "ana@rugido.gym");
        let template = db.create_template("Full body A", Some("Base"), None).unwrap();
        db.add_exercise(template, "Squat", 3, 12, None).unwrap();
        db.add_exercise(template, "Bench press", 4, 8, Some("slow down"))
            .unwrap();

        let cloned = db.clone_template_to_student(template, student).unwrap();
        assert_ne!(cloned, template);

        let workouts = db.student_workouts(student).unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].name, "Full body A");
        assert!(!workouts[0].is_template);

        let exercises = db.workout_exercises(cloned).unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].name, "Squat");
        assert_eq!(exercises[1].notes.as_deref(), Some("slow down"));

        // The template keeps its own list untouched.
        assert_eq!(db.workout_exercises(template).unwrap().len(), 2);
    }

    #[test]
    fn test_clone_missing_template_fails() {
        let mut db = test_db();
        let student = add_student(&db, "Ana", "ana@rugido.gym");
        assert!(db.clone_template_to_student(999, student).is_err());
    }

    #[test]
    fn test_clone_to_non_student_fails() {
        let mut db = test_db();
        let prof = add_professor(&db, "Bruno", "bruno@rugido.gym");
        let template = db.create_template("Full body A", None, None).unwrap();
        assert!(db.clone_template_to_student(template, prof).is_err());
    }

    #[test]
    fn test_mark_paid_missing_payment_fails() {
        let db = test_db();
        assert!(db.mark_paid(42, day("2024-03-10")).is_err());
    }

    #[test]
    fn test_mark_paid_sets_status_and_date() {
        let db = test_db();
        let id = add_student(&db, "Ana", "ana@rugido.gym");
        let charge = db.create_charge(id, 4990, day("2024-03-05"), "2024-03").unwrap();

        db.mark_paid(charge, day("2024-03-04")).unwrap();

        let payments = db.list_payments(None).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Paid);
        assert_eq!(payments[0].payment_date, Some(day("2024-03-04")));
    }

    #[test]
    fn test_generate_monthly_charges_skips_already_charged() {
        let mut db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        add_student(&db, "Carla", "carla@rugido.gym");
        db.create_charge(ana, 4990, day("2024-03-05"), "2024-03").unwrap();

        let created = db
            .generate_monthly_charges(4990, day("2024-03-05"), "2024-03")
            .unwrap();
        assert_eq!(created, 1);

        // Running again creates nothing new.
        let again = db
            .generate_monthly_charges(4990, day("2024-03-05"), "2024-03")
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(db.list_payments(None).unwrap().len(), 2);
    }

    #[test]
    fn test_dashboard_stats() {
        let db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        add_professor(&db, "Bruno", "bruno@rugido.gym");
        db.check_in(ana, None, day("2024-03-10")).unwrap();
        db.create_charge(ana, 4990, day("2024-03-05"), "2024-03").unwrap();

        let stats = db.dashboard_stats(day("2024-03-10")).unwrap();
        assert_eq!(stats.students, 1);
        assert_eq!(stats.professors, 1);
        assert_eq!(stats.checkins_today, 1);
        assert_eq!(stats.pending_payments, 1);
    }

    #[test]
    fn test_list_payments_filtered_by_student() {
        let db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        let carla = add_student(&db, "Carla", "carla@rugido.gym");
        db.create_charge(ana, 4990, day("2024-03-05"), "2024-03").unwrap();
        db.create_charge(carla, 4990, day("2024-03-05"), "2024-03").unwrap();

        let mine = db.list_payments(Some(ana)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, ana);
        assert_eq!(db.list_payments(None).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_user_removes_dependent_records() {
        let mut db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        let template = db.create_template("Full body A", None, None).unwrap();
        db.add_exercise(template, "Squat", 3, 12, None).unwrap();
        let workout = db.clone_template_to_student(template, ana).unwrap();
        db.check_in(ana, Some(workout), day("2024-03-10")).unwrap();
        db.create_charge(ana, 4990, day("2024-03-05"), "2024-03").unwrap();
        db.link_telegram(100, ana).unwrap();

        db.delete_user(ana).unwrap();

        assert!(db.user_by_email("ana@rugido.gym").unwrap().is_none());
        assert!(db.student_workouts(ana).unwrap().is_empty());
        assert!(db.workout_exercises(workout).unwrap().is_empty());
        assert!(db.attendance_days(ana).unwrap().is_empty());
        assert!(db.list_payments(Some(ana)).unwrap().is_empty());
        assert!(db.user_by_chat(100).unwrap().is_none());

        // The library template survives.
        assert_eq!(db.list_templates().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_professor_unassigns_students() {
        let mut db = test_db();
        let prof = add_professor(&db, "Bruno", "bruno@rugido.gym");
        let ana = db
            .create_user(&Profile {
                id: None,
                name: "Ana".to_string(),
                email: "ana@rugido.gym".to_string(),
                role: Role::Student,
                professor_id: Some(prof),
            })
            .unwrap();
        db.create_template("Full body A", None, Some(prof)).unwrap();

        db.delete_user(prof).unwrap();

        let ana = db.user_by_id(ana).unwrap().unwrap();
        assert_eq!(ana.professor_id, None);
        let templates = db.list_templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].professor_id, None);
    }

    #[test]
    fn test_delete_missing_user_fails() {
        let mut db = test_db();
        assert!(db.delete_user(999).is_err());
    }

    #[test]
    fn test_delete_workout_removes_exercises_keeps_checkins() {
        let mut db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        let template = db.create_template("Full body A", None, None).unwrap();
        db.add_exercise(template, "Squat", 3, 12, None).unwrap();
        let workout = db.clone_template_to_student(template, ana).unwrap();
        db.check_in(ana, Some(workout), day("2024-03-10")).unwrap();

        db.delete_workout(workout).unwrap();

        assert!(db.student_workouts(ana).unwrap().is_empty());
        assert!(db.workout_exercises(workout).unwrap().is_empty());
        // The check-in day itself is history and stays.
        assert_eq!(db.attendance_days(ana).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_workout_fails() {
        let mut db = test_db();
        assert!(db.delete_workout(999).is_err());
    }

    #[test]
    fn test_delete_exercise() {
        let db = test_db();
        let template = db.create_template("Full body A", None, None).unwrap();
        let squat = db.add_exercise(template, "Squat", 3, 12, None).unwrap();
        db.add_exercise(template, "Bench press", 4, 8, None).unwrap();

        db.delete_exercise(squat).unwrap();

        let left = db.workout_exercises(template).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Bench press");
        assert!(db.delete_exercise(squat).is_err());
    }

    #[test]
    fn test_corrupted_role_column_surfaces_error() {
        let db = test_db();
        let id = add_student(&db, "Ana", "ana@rugido.gym");
        db.conn
            .execute(
                "UPDATE profiles SET role = 'coach' WHERE id = ?1",
                params![id],
            )
            .unwrap();

        assert!(db.user_by_email("ana@rugido.gym").is_err());
        assert!(db.user_by_id(id).is_err());
    }

    #[test]
    fn test_telegram_link_replaces_previous() {
        let db = test_db();
        let ana = add_student(&db, "Ana", "ana@rugido.gym");
        let carla = add_student(&db, "Carla", "carla@rugido.gym");

        db.link_telegram(100, ana).unwrap();
        db.link_telegram(100, carla).unwrap();

        let linked = db.user_by_chat(100).unwrap().unwrap();
        assert_eq!(linked.id, Some(carla));
        assert!(db.user_by_chat(200).unwrap().is_none());
    }
}

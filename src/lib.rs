//! rugido - Gym management tracker
//!
//! Attendance calendar and streaks, workout templates, monthly charges.

pub mod attendance;
pub mod bot;
pub mod db;
pub mod tui;

pub use db::Database;

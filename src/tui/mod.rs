//! TUI module - attendance calendar dashboard with ratatui

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::io::{stdout, Stdout};

use crate::attendance::{days_in_month, first_weekday_of_month, AttendanceLog};
use crate::db::{Database, Profile};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const WEEK_HEADER: &str = " Su  Mo  Tu  We  Th  Fr  Sa";

/// App state for the calendar TUI
pub struct App {
    db: Database,
    student: Profile,
    log: AttendanceLog,
    /// First day of the month currently shown
    cursor: NaiveDate,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database, email: &str) -> Result<Self> {
        let student = db
            .user_by_email(email)?
            .ok_or_else(|| anyhow!("no user with email {}", email))?;
        let user_id = student.id.ok_or_else(|| anyhow!("student has no id"))?;
        let log = AttendanceLog::from_days(db.attendance_days(user_id)?);

        let today = Local::now().date_naive();
        let cursor = today.with_day(1).unwrap_or(today);

        Ok(Self {
            db,
            student,
            log,
            cursor,
            should_quit: false,
        })
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }

        restore_terminal()?;
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        let now = Local::now().naive_local();
        let today = now.date();

        // Header
        let header = Paragraph::new(format!("Rugido - {}", self.student.name))
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        // Stats line: month total + current streak
        let view = self.log.month_view(self.cursor.year(), self.cursor.month());
        let streak = self.log.current_streak(now);
        let stats = Paragraph::new(format!(
            "Check-ins this month: {}   Streak: {} days",
            view.total_count(),
            streak
        ))
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(stats, chunks[1]);

        // Calendar grid
        let title = self.cursor.format("%B %Y").to_string();
        let calendar = Paragraph::new(self.calendar_lines(today))
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(calendar, chunks[2]);

        // Footer
        let footer = Paragraph::new("q: quit | h/l: prev/next month | r: refresh")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    /// Month grid as text lines; checked-in days are bracketed, today is
    /// starred.
    fn calendar_lines(&self, today: NaiveDate) -> Vec<Line<'static>> {
        let year = self.cursor.year();
        let month = self.cursor.month();
        let view = self.log.month_view(year, month);

        let mut lines = vec![Line::from(WEEK_HEADER.bold())];
        let mut cells: Vec<Span> = Vec::new();

        for _ in 0..first_weekday_of_month(year, month) {
            cells.push(Span::raw("    "));
        }

        for day in 1..=days_in_month(year, month) {
            let checked = view.days_with_attendance.contains(&day);
            let is_today = today.year() == year && today.month() == month && today.day() == day;

            let text = if checked {
                format!("[{:>2}]", day)
            } else if is_today {
                format!("*{:>2} ", day)
            } else {
                format!(" {:>2} ", day)
            };

            let style = if checked {
                Style::default().fg(Color::Green).bold()
            } else if is_today {
                Style::default().fg(Color::Magenta).bold()
            } else {
                Style::default()
            };
            cells.push(Span::styled(text, style));

            if (cells.len() % 7) == 0 {
                lines.push(Line::from(std::mem::take(&mut cells)));
            }
        }
        if !cells.is_empty() {
            lines.push(Line::from(cells));
        }

        lines
    }

    fn previous_month(&mut self) {
        let (year, month) = if self.cursor.month() == 1 {
            (self.cursor.year() - 1, 12)
        } else {
            (self.cursor.year(), self.cursor.month() - 1)
        };
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, 1) {
            self.cursor = d;
        }
    }

    /// Advance a month, but never past the current one.
    fn next_month(&mut self) {
        let today = Local::now().date_naive();
        if self.cursor.year() == today.year() && self.cursor.month() == today.month() {
            return;
        }
        let (year, month) = if self.cursor.month() == 12 {
            (self.cursor.year() + 1, 1)
        } else {
            (self.cursor.year(), self.cursor.month() + 1)
        };
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, 1) {
            self.cursor = d;
        }
    }

    fn refresh(&mut self) -> Result<()> {
        if let Some(user_id) = self.student.id {
            self.log = AttendanceLog::from_days(self.db.attendance_days(user_id)?);
        }
        Ok(())
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => self.should_quit = true,
                        KeyCode::Char('r') => self.refresh()?,
                        KeyCode::Char('h') | KeyCode::Left => self.previous_month(),
                        KeyCode::Char('l') | KeyCode::Right => self.next_month(),
                        _ => {}
                    }
                }
        Ok(())
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

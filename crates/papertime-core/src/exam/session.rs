//! Exam session data: the clock, the entered marks, and the validated
//! submission built from them.

use std::fmt;

use serde::Serialize;

use crate::models::Paper;

use super::ExamError;

/// Highest score a candidate can report.
pub const MAX_MARKS: i64 = 100;

/// Where an exam attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamState {
    NotStarted,
    InProgress,
    Ended,
    Submitting,
    Submitted,
    SubmissionFailed,
}

impl ExamState {
    /// Marks may be entered or edited.
    pub fn accepts_marks(self) -> bool {
        matches!(self, ExamState::Ended | ExamState::SubmissionFailed)
    }

    pub fn is_terminal(self) -> bool {
        self == ExamState::Submitted
    }

    pub fn label(self) -> &'static str {
        match self {
            ExamState::NotStarted => "not started",
            ExamState::InProgress => "in progress",
            ExamState::Ended => "ended",
            ExamState::Submitting => "submitting",
            ExamState::Submitted => "submitted",
            ExamState::SubmissionFailed => "submission failed",
        }
    }
}

impl fmt::Display for ExamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated score report. Serialises to `{"time_spent": .., "marks": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    time_spent: u32,
    marks: u8,
}

impl SubmissionResult {
    pub(crate) fn new(time_spent: u32, marks: Option<i64>) -> Result<Self, ExamError> {
        let raw = marks.ok_or(ExamError::MissingMarks)?;
        let marks = u8::try_from(raw)
            .ok()
            .filter(|m| i64::from(*m) <= MAX_MARKS)
            .ok_or(ExamError::OutOfRange(raw))?;
        Ok(Self { time_spent, marks })
    }

    pub fn time_spent(&self) -> u32 {
        self.time_spent
    }

    pub fn marks(&self) -> u8 {
        self.marks
    }
}

/// Remaining time for one attempt. Never increases and never drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamClock {
    initial: u32,
    remaining: u32,
}

impl ExamClock {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: initial,
        }
    }

    /// Advance one second. Returns true on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_elapsed(&self) -> bool {
        self.remaining == 0
    }

    pub fn time_spent(&self) -> u32 {
        self.initial - self.remaining
    }
}

/// Per-attempt data owned by the controller.
#[derive(Debug, Clone)]
pub struct ExamSession {
    paper_id: i64,
    title: String,
    clock: ExamClock,
    marks: Option<i64>,
}

impl ExamSession {
    /// `default_duration` (seconds) applies when the paper has no usable
    /// duration of its own.
    pub fn new(paper: &Paper, default_duration: u32) -> Self {
        let initial = paper.duration_seconds().unwrap_or(default_duration);
        Self {
            paper_id: paper.id,
            title: paper.title.clone(),
            clock: ExamClock::new(initial),
            marks: None,
        }
    }

    pub fn paper_id(&self) -> i64 {
        self.paper_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn clock(&self) -> &ExamClock {
        &self.clock
    }

    pub(crate) fn clock_mut(&mut self) -> &mut ExamClock {
        &mut self.clock
    }

    pub fn marks(&self) -> Option<i64> {
        self.marks
    }

    pub(crate) fn set_marks(&mut self, marks: Option<i64>) {
        self.marks = marks;
    }
}

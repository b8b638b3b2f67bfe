//! Exam paper and submission models.

use serde::{Deserialize, Serialize};

use crate::utils::format_date;

/// Exam paper metadata as returned by `GET /papers/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default)]
    pub total_marks: i64,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

impl Paper {
    /// Allotted time in seconds, or `None` when the server did not set a
    /// usable duration.
    pub fn duration_seconds(&self) -> Option<u32> {
        if self.duration_minutes > 0 {
            u32::try_from(self.duration_minutes.saturating_mul(60)).ok()
        } else {
            None
        }
    }

    pub fn has_document(&self) -> bool {
        self.pdf_path.as_deref().map(|p| !p.is_empty()).unwrap_or(false)
    }

    pub fn duration_display(&self) -> String {
        if self.duration_minutes > 0 {
            format!("{} mins", self.duration_minutes)
        } else {
            "untimed".to_string()
        }
    }
}

/// A stored score, as returned by the submit and history endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(default)]
    pub id: i64,
    pub paper_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub time_spent: i64,
    pub marks: i64,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl SubmissionRecord {
    pub fn submitted_display(&self) -> String {
        self.submitted_at
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper_ignores_questions() {
        let json = r#"{
            "id": 7,
            "title": "Organic Chemistry Mock",
            "description": "Paper 2",
            "duration_minutes": 90,
            "total_marks": 100,
            "pdf_path": "uploads/paper_7.pdf",
            "questions": [{"id": 1, "paper_id": 7, "question_text": "?", "answer": "!", "marks": 5}]
        }"#;
        let paper: Paper = serde_json::from_str(json).expect("parse paper");
        assert_eq!(paper.id, 7);
        assert_eq!(paper.duration_seconds(), Some(5400));
        assert!(paper.has_document());
        assert_eq!(paper.duration_display(), "90 mins");
    }

    #[test]
    fn test_paper_without_duration() {
        let json = r#"{"id": 1, "title": "Draft", "duration_minutes": 0, "total_marks": 0}"#;
        let paper: Paper = serde_json::from_str(json).expect("parse paper");
        assert_eq!(paper.duration_seconds(), None);
        assert!(!paper.has_document());
        assert_eq!(paper.duration_display(), "untimed");
    }

    #[test]
    fn test_parse_submission_record() {
        let json = r#"{"id": 12, "paper_id": 7, "user_id": 3, "time_spent": 45, "marks": 82, "submitted_at": "2024-05-01T10:00:00Z"}"#;
        let record: SubmissionRecord = serde_json::from_str(json).expect("parse record");
        assert_eq!(record.time_spent, 45);
        assert_eq!(record.marks, 82);
        assert_eq!(record.submitted_display(), "May 01, 2024");
    }
}

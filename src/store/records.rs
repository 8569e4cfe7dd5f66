use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionCategory {
    General,
    Technical,
    Behavioral,
    ProblemSolving,
}

impl Default for QuestionCategory {
    fn default() -> Self {
        QuestionCategory::General
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionDifficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for QuestionDifficulty {
    fn default() -> Self {
        QuestionDifficulty::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateStatus {
    Draft,
    Ready,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Ongoing,
    Completed,
}

/// One question in an interview template, with its scoring rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTemplate {
    pub question: String,
    pub expected_keywords: Vec<String>,
    #[serde(default)]
    pub category: QuestionCategory,
    #[serde(default)]
    pub difficulty: QuestionDifficulty,
    #[serde(default)]
    pub order: usize,
}

/// A reusable set of interview questions bound to a room.
///
/// `template_id` is the store-assigned identity; `room_id` is the
/// draft/ready key a live room saves under. Lookup works by either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewTemplate {
    pub template_id: String,
    pub room_id: String,
    pub title: String,
    pub questions: Vec<QuestionTemplate>,
    pub status: TemplateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewTemplate {
    pub fn new(template_id: String, room_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            template_id,
            room_id,
            title,
            questions: Vec::new(),
            status: TemplateStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One answered (or placeholder) slot in an evaluation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question: String,
    pub expected_keywords: Vec<String>,
    pub participant_answer: String,
    pub extracted_keywords: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_strengths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_improvements: Option<Vec<String>>,
    pub evaluation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl QuestionAnswer {
    /// Empty slot used to pad a session up to a submitted question index.
    pub fn placeholder() -> Self {
        Self {
            question: String::new(),
            expected_keywords: Vec::new(),
            participant_answer: String::new(),
            extracted_keywords: Vec::new(),
            matched_keywords: Vec::new(),
            score: 0,
            ai_feedback: None,
            ai_strengths: None,
            ai_improvements: None,
            evaluation_type: String::new(),
            timestamp: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.participant_answer.is_empty()
    }
}

/// The mutable record of answers and scores for one room's interview pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSession {
    pub session_id: String,
    pub room_id: String,
    pub questions_answers: Vec<QuestionAnswer>,
    pub total_questions: usize,
    pub average_score: f64,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl EvaluationSession {
    pub fn new(session_id: String, room_id: String) -> Self {
        Self {
            session_id,
            room_id,
            questions_answers: Vec::new(),
            total_questions: 0,
            average_score: 0.0,
            status: SessionStatus::Ongoing,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Recomputes `average_score` (mean of all slot scores, two decimals)
    /// and `total_questions`. Must be called after every slot mutation.
    pub fn recalculate(&mut self) {
        self.total_questions = self.questions_answers.len();
        if self.questions_answers.is_empty() {
            self.average_score = 0.0;
        } else {
            let total: u32 = self.questions_answers.iter().map(|qa| qa.score as u32).sum();
            let mean = total as f64 / self.questions_answers.len() as f64;
            self.average_score = (mean * 100.0).round() / 100.0;
        }
    }

    /// Grows the answer array with placeholders so `index` is addressable.
    /// The array is never sparse.
    pub fn pad_to(&mut self, index: usize) {
        while self.questions_answers.len() <= index {
            self.questions_answers.push(QuestionAnswer::placeholder());
        }
    }

    pub fn answered_count(&self) -> usize {
        self.questions_answers.iter().filter(|qa| qa.is_answered()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_empty_session_is_zero() {
        let mut session = EvaluationSession::new("session-1".into(), "room-1".into());
        session.recalculate();
        assert_eq!(session.average_score, 0.0);
        assert_eq!(session.total_questions, 0);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        let mut session = EvaluationSession::new("session-1".into(), "room-1".into());
        for score in [100u8, 60, 40] {
            let mut qa = QuestionAnswer::placeholder();
            qa.score = score;
            qa.participant_answer = "something".into();
            session.questions_answers.push(qa);
        }
        session.recalculate();
        // (100 + 60 + 40) / 3 = 66.666... -> 66.67
        assert_eq!(session.average_score, 66.67);
        assert_eq!(session.total_questions, 3);
    }

    #[test]
    fn test_pad_to_fills_placeholders() {
        let mut session = EvaluationSession::new("session-1".into(), "room-1".into());
        session.pad_to(3);
        assert_eq!(session.questions_answers.len(), 4);
        assert!(session.questions_answers.iter().all(|qa| !qa.is_answered()));
        assert!(session.questions_answers.iter().all(|qa| qa.score == 0));

        // Padding to a smaller index leaves the array alone
        session.pad_to(1);
        assert_eq!(session.questions_answers.len(), 4);
    }

    #[test]
    fn test_template_status_wire_format() {
        let json = serde_json::to_string(&TemplateStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let json = serde_json::to_string(&SessionStatus::Ongoing).unwrap();
        assert_eq!(json, "\"ongoing\"");
        let json = serde_json::to_string(&QuestionCategory::ProblemSolving).unwrap();
        assert_eq!(json, "\"problem-solving\"");
        let json = serde_json::to_string(&QuestionDifficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}

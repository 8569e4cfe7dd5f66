use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{QuestionCategory, QuestionDifficulty, QuestionTemplate};

/// The `new-question` payload is a string-or-object union on the wire.
/// It is normalized into one canonical `{question, keywords}` shape before
/// entering the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionPayload {
    Text(String),
    Detailed {
        question: String,
        #[serde(default)]
        keywords: Vec<String>,
    },
}

impl QuestionPayload {
    pub fn into_parts(self) -> (String, Vec<String>) {
        match self {
            QuestionPayload::Text(question) => (question, Vec::new()),
            QuestionPayload::Detailed { question, keywords } => (question, keywords),
        }
    }
}

/// One question as submitted in a template save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub question: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<QuestionCategory>,
    #[serde(default)]
    pub difficulty: Option<QuestionDifficulty>,
}

/// Inbound socket events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },

    #[serde(rename_all = "camelCase")]
    Offer { room_id: String, offer: Value },

    #[serde(rename_all = "camelCase")]
    Answer { room_id: String, answer: Value },

    #[serde(rename_all = "camelCase")]
    IceCandidate { room_id: String, candidate: Value },

    #[serde(rename_all = "camelCase")]
    InterviewerToggle { cam_on: bool, mic_on: bool },

    #[serde(rename_all = "camelCase")]
    ParticipantToggle { cam_on: bool, mic_on: bool },

    StartMeeting,

    EndMeeting,

    NewQuestion { question: QuestionPayload },

    #[serde(rename_all = "camelCase")]
    SaveInterviewTemplate {
        room_id: String,
        #[serde(default)]
        title: Option<String>,
        questions: Vec<QuestionInput>,
    },

    #[serde(rename_all = "camelCase")]
    GetInterviewTemplate { room_id: String },

    #[serde(rename_all = "camelCase")]
    LoadTemplateById {
        template_id: String,
        #[serde(default)]
        room_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    AskQuestion {
        room_id: String,
        question_index: usize,
        #[serde(default)]
        template_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        room_id: String,
        question_index: usize,
        answer: String,
        #[serde(default)]
        template_id: Option<String>,
    },
}

/// Outbound socket events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    UserJoined { peer_id: String },

    Offer { offer: Value, from: String },

    Answer { answer: Value, from: String },

    IceCandidate { candidate: Value, from: String },

    #[serde(rename_all = "camelCase")]
    UpdateInterviewer { cam_on: bool, mic_on: bool },

    #[serde(rename_all = "camelCase")]
    UpdateParticipant { cam_on: bool, mic_on: bool },

    MeetingStarted,

    MeetingEnded,

    #[serde(rename_all = "camelCase")]
    MeetingStatus {
        meeting_state: bool,
        elapsed_seconds: u64,
    },

    NewQuestion {
        question: String,
        keywords: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    TemplateSaved {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        question_count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    TemplateLoaded {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        template_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        questions: Option<Vec<QuestionTemplate>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<crate::store::TemplateStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ReceiveQuestion {
        question_index: usize,
        question: String,
        total_questions: usize,
    },

    #[serde(rename_all = "camelCase")]
    QuestionSent {
        question_index: usize,
        question: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    QuestionError { message: String },

    #[serde(rename_all = "camelCase")]
    AnswerEvaluated {
        question_index: usize,
        score: u8,
        matched_keywords: Vec<String>,
        participant_keywords: Vec<String>,
        match_percentage: u8,
        average_score: f64,
        total_questions: usize,
        evaluation_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        strengths: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        improvements: Option<Vec<String>>,
    },

    #[serde(rename_all = "camelCase")]
    AnswerSubmitted {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        question_index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ScoresUpdated {
        average_score: f64,
        total_questions: usize,
        scores: Vec<u8>,
    },

    #[serde(rename_all = "camelCase")]
    SessionCompleted {
        average_score: f64,
        total_questions: usize,
    },

    Error { message: String },
}

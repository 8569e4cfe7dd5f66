use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::Mutex;

use super::keywords;
use super::scorer::AnswerScorer;
use crate::error::{Result, ServerError};
use crate::store::{
    EvaluationSession, EvaluationStore, InterviewTemplate, QuestionAnswer, QuestionCategory,
    QuestionDifficulty, QuestionTemplate, TemplateStatus,
};

/// Normalized question input for a template save.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub question: String,
    pub keywords: Vec<String>,
    pub category: Option<QuestionCategory>,
    pub difficulty: Option<QuestionDifficulty>,
}

/// A question resolved for asking. Expected keywords are deliberately
/// absent: they never leave the server on the ask path.
#[derive(Debug, Clone)]
pub struct AskedQuestion {
    pub question_index: usize,
    pub question: String,
    pub total_questions: usize,
}

/// Outcome of one scored answer submission, ready for broadcast.
#[derive(Debug, Clone)]
pub struct AnswerEvaluation {
    pub question_index: usize,
    pub score: u8,
    pub matched_keywords: Vec<String>,
    pub participant_keywords: Vec<String>,
    pub match_percentage: u8,
    pub feedback: Option<String>,
    pub strengths: Option<Vec<String>>,
    pub improvements: Option<Vec<String>>,
    pub evaluation_type: String,
    pub average_score: f64,
    pub answered_count: usize,
    pub scores: Vec<u8>,
}

/// Orchestrates question delivery and answer scoring against the store.
///
/// Session writes for a room run under a per-room mutex so concurrent
/// submissions cannot interleave around the store round-trip.
pub struct EvaluationPipeline {
    store: Arc<dyn EvaluationStore>,
    scorer: Option<Arc<dyn AnswerScorer>>,
    room_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EvaluationPipeline {
    pub fn new(store: Arc<dyn EvaluationStore>, scorer: Option<Arc<dyn AnswerScorer>>) -> Self {
        Self {
            store,
            scorer,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.room_locks.lock().await;
        locks
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolves a template by explicit id when given, otherwise by room.
    async fn resolve_template(
        &self,
        room_id: &str,
        template_id: Option<&str>,
    ) -> Result<InterviewTemplate> {
        let template = match template_id {
            Some(id) => self.store.find_template_by_id(id).await?,
            None => self.store.find_template_by_room(room_id).await?,
        };

        template.ok_or_else(|| {
            ServerError::TemplateNotFound(template_id.unwrap_or(room_id).to_string())
        })
    }

    pub async fn ask_question(
        &self,
        room_id: &str,
        question_index: usize,
        template_id: Option<&str>,
    ) -> Result<AskedQuestion> {
        let template = self.resolve_template(room_id, template_id).await?;
        let total = template.questions.len();
        let question = template
            .questions
            .get(question_index)
            .ok_or(ServerError::QuestionOutOfRange {
                index: question_index,
                total,
            })?;

        tracing::info!(
            room_id = %room_id,
            question_index = question_index,
            "Asking question"
        );

        Ok(AskedQuestion {
            question_index,
            question: question.question.clone(),
            total_questions: total,
        })
    }

    pub async fn submit_answer(
        &self,
        room_id: &str,
        question_index: usize,
        answer: &str,
        template_id: Option<&str>,
    ) -> Result<AnswerEvaluation> {
        let template = self.resolve_template(room_id, template_id).await?;
        let total = template.questions.len();
        let question = template
            .questions
            .get(question_index)
            .ok_or(ServerError::QuestionOutOfRange {
                index: question_index,
                total,
            })?;
        let expected_keywords = question.expected_keywords.clone();

        // The keyword pass always runs: it supplies extracted keywords and
        // the match percentage even when the AI verdict wins, and it is the
        // complete result when the AI path is missing or failing.
        let keyword_eval = keywords::evaluate_answer(answer, &expected_keywords, None);

        let (record, evaluation_type) = match self.ai_verdict(question, answer).await {
            Some(ai) => {
                let qa = QuestionAnswer {
                    question: question.question.clone(),
                    expected_keywords: expected_keywords.clone(),
                    participant_answer: answer.to_string(),
                    extracted_keywords: keyword_eval.participant_keywords.clone(),
                    matched_keywords: ai.matched_concepts.clone(),
                    score: ai.score,
                    ai_feedback: Some(ai.feedback),
                    ai_strengths: Some(ai.strengths),
                    ai_improvements: Some(ai.improvements),
                    evaluation_type: "AI".to_string(),
                    timestamp: Some(Utc::now()),
                };
                (qa, "AI".to_string())
            }
            None => {
                let feedback = format!(
                    "Basic keyword matching used (AI unavailable). Score based on {}% keyword match.",
                    keyword_eval.match_percentage
                );
                let strengths = vec![format!(
                    "Mentioned {} relevant keywords",
                    keyword_eval.matched_keywords.len()
                )];
                let improvements =
                    vec!["AI evaluation unavailable - keyword matching used as fallback".to_string()];
                let qa = QuestionAnswer {
                    question: question.question.clone(),
                    expected_keywords: expected_keywords.clone(),
                    participant_answer: answer.to_string(),
                    extracted_keywords: keyword_eval.participant_keywords.clone(),
                    matched_keywords: keyword_eval.matched_keywords.clone(),
                    score: keyword_eval.score,
                    ai_feedback: Some(feedback),
                    ai_strengths: Some(strengths),
                    ai_improvements: Some(improvements),
                    evaluation_type: "Keyword (Fallback)".to_string(),
                    timestamp: Some(Utc::now()),
                };
                (qa, "Keyword (Fallback)".to_string())
            }
        };

        // Find-or-create, pad, overwrite, recompute, persist - serialized
        // per room so racing submissions cannot lose writes.
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut session = match self.store.find_ongoing_session(room_id).await? {
            Some(session) => session,
            None => EvaluationSession::new(generate_session_id(), room_id.to_string()),
        };

        session.pad_to(question_index);
        session.questions_answers[question_index] = record.clone();
        session.recalculate();
        self.store.upsert_session(session.clone()).await?;

        tracing::info!(
            room_id = %room_id,
            question_index = question_index,
            score = record.score,
            evaluation_type = %evaluation_type,
            average_score = session.average_score,
            "Answer evaluated and saved"
        );

        Ok(AnswerEvaluation {
            question_index,
            score: record.score,
            matched_keywords: record.matched_keywords,
            participant_keywords: record.extracted_keywords,
            match_percentage: keyword_eval.match_percentage,
            feedback: record.ai_feedback,
            strengths: record.ai_strengths,
            improvements: record.ai_improvements,
            evaluation_type,
            average_score: session.average_score,
            answered_count: session.answered_count(),
            scores: session.questions_answers.iter().map(|qa| qa.score).collect(),
        })
    }

    /// Runs the AI scorer when configured; any failure is logged and
    /// degrades to None so the keyword path takes over.
    async fn ai_verdict(
        &self,
        question: &QuestionTemplate,
        answer: &str,
    ) -> Option<super::scorer::AiEvaluation> {
        let scorer = self.scorer.as_ref()?;
        match scorer
            .score_answer(&question.question, answer, &question.expected_keywords)
            .await
        {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                tracing::warn!(error = %e, "AI scorer failed, using keyword fallback");
                None
            }
        }
    }

    /// Find-or-create by room, full replace of questions, status ready.
    pub async fn save_template(
        &self,
        room_id: &str,
        title: Option<String>,
        questions: Vec<QuestionSpec>,
    ) -> Result<InterviewTemplate> {
        let mut template = match self.store.find_template_by_room(room_id).await? {
            Some(template) => template,
            None => InterviewTemplate::new(
                generate_template_id(),
                room_id.to_string(),
                title.clone().unwrap_or_else(|| "Technical Interview".to_string()),
            ),
        };

        if let Some(title) = title {
            template.title = title;
        }
        template.questions = normalize_questions(questions);
        template.status = TemplateStatus::Ready;
        template.updated_at = Utc::now();

        self.store.upsert_template(template.clone()).await?;

        tracing::info!(
            room_id = %room_id,
            template_id = %template.template_id,
            question_count = template.questions.len(),
            "Interview template saved"
        );

        Ok(template)
    }

    pub async fn load_template(&self, room_id: &str) -> Result<InterviewTemplate> {
        self.resolve_template(room_id, None).await
    }

    pub async fn load_template_by_id(&self, template_id: &str) -> Result<InterviewTemplate> {
        self.resolve_template("", Some(template_id)).await
    }

    /// Rebinds a loaded template to a different room so room-keyed
    /// lookups resolve to it from now on.
    pub async fn rebind_template(
        &self,
        mut template: InterviewTemplate,
        room_id: String,
    ) -> Result<InterviewTemplate> {
        tracing::info!(
            template_id = %template.template_id,
            room_id = %room_id,
            "Rebinding template to room"
        );
        template.room_id = room_id;
        template.updated_at = Utc::now();
        self.store.upsert_template(template.clone()).await?;
        Ok(template)
    }

    /// Completes the room's ongoing session, if any. Returns the completed
    /// session so the caller can broadcast the final scores.
    pub async fn complete_session(&self, room_id: &str) -> Result<Option<EvaluationSession>> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let Some(mut session) = self.store.find_ongoing_session(room_id).await? else {
            return Ok(None);
        };

        session.status = crate::store::SessionStatus::Completed;
        session.end_time = Some(Utc::now());
        session.recalculate();
        self.store.upsert_session(session.clone()).await?;

        tracing::info!(
            room_id = %room_id,
            session_id = %session.session_id,
            average_score = session.average_score,
            "Evaluation session completed"
        );

        Ok(Some(session))
    }
}

pub fn normalize_questions(questions: Vec<QuestionSpec>) -> Vec<QuestionTemplate> {
    questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| QuestionTemplate {
            question: q.question,
            expected_keywords: q.keywords,
            category: q.category.unwrap_or_default(),
            difficulty: q.difficulty.unwrap_or_default(),
            order: index,
        })
        .collect()
}

pub fn generate_session_id() -> String {
    // The timestamp alone can collide when a session is completed and
    // reopened within the same millisecond.
    format!(
        "session-{}-{:04x}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen::<u16>()
    )
}

pub fn generate_template_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("tpl-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::scorer::{AiEvaluation, ScorerError};
    use crate::store::{MemoryStore, SessionStatus};
    use async_trait::async_trait;

    struct FailingScorer;

    #[async_trait]
    impl AnswerScorer for FailingScorer {
        async fn score_answer(
            &self,
            _question: &str,
            _answer: &str,
            _expected_keywords: &[String],
        ) -> std::result::Result<AiEvaluation, ScorerError> {
            Err(ScorerError::Request("connection refused".to_string()))
        }
    }

    struct FixedScorer(u8);

    #[async_trait]
    impl AnswerScorer for FixedScorer {
        async fn score_answer(
            &self,
            _question: &str,
            _answer: &str,
            expected_keywords: &[String],
        ) -> std::result::Result<AiEvaluation, ScorerError> {
            Ok(AiEvaluation {
                score: self.0,
                feedback: "Good coverage of the fundamentals.".to_string(),
                strengths: vec!["clarity".to_string()],
                improvements: vec!["depth".to_string()],
                matched_concepts: expected_keywords.to_vec(),
            })
        }
    }

    fn spec(question: &str, keywords: &[&str]) -> QuestionSpec {
        QuestionSpec {
            question: question.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category: None,
            difficulty: None,
        }
    }

    async fn pipeline_with_template(
        scorer: Option<Arc<dyn AnswerScorer>>,
    ) -> EvaluationPipeline {
        let store = Arc::new(MemoryStore::new());
        let pipeline = EvaluationPipeline::new(store, scorer);
        pipeline
            .save_template(
                "room-1",
                Some("React Basics".to_string()),
                vec![
                    spec("What are React hooks?", &["react", "hooks", "state"]),
                    spec("Explain the virtual DOM", &["virtual", "dom", "diffing", "render"]),
                ],
            )
            .await
            .unwrap();
        pipeline
    }

    #[tokio::test]
    async fn test_save_template_normalizes_questions() {
        let pipeline = pipeline_with_template(None).await;
        let template = pipeline.load_template("room-1").await.unwrap();

        assert_eq!(template.status, TemplateStatus::Ready);
        assert_eq!(template.questions.len(), 2);
        assert_eq!(template.questions[0].order, 0);
        assert_eq!(template.questions[1].order, 1);
        assert_eq!(template.questions[0].category, QuestionCategory::General);
        assert_eq!(template.questions[0].difficulty, QuestionDifficulty::Medium);
    }

    #[tokio::test]
    async fn test_resave_replaces_questions_keeping_identity() {
        let pipeline = pipeline_with_template(None).await;
        let original = pipeline.load_template("room-1").await.unwrap();

        let updated = pipeline
            .save_template("room-1", None, vec![spec("Only question now", &["solo"])])
            .await
            .unwrap();

        assert_eq!(updated.template_id, original.template_id);
        assert_eq!(updated.questions.len(), 1);
        assert_eq!(updated.title, "React Basics");
    }

    #[tokio::test]
    async fn test_ask_question_resolves_and_bounds() {
        let pipeline = pipeline_with_template(None).await;

        let asked = pipeline.ask_question("room-1", 1, None).await.unwrap();
        assert_eq!(asked.question, "Explain the virtual DOM");
        assert_eq!(asked.total_questions, 2);

        let err = pipeline.ask_question("room-1", 5, None).await.unwrap_err();
        assert!(matches!(err, ServerError::QuestionOutOfRange { index: 5, total: 2 }));

        let err = pipeline.ask_question("room-none", 0, None).await.unwrap_err();
        assert!(matches!(err, ServerError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_ask_question_by_template_id() {
        let pipeline = pipeline_with_template(None).await;
        let template = pipeline.load_template("room-1").await.unwrap();

        let asked = pipeline
            .ask_question("other-room", 0, Some(&template.template_id))
            .await
            .unwrap();
        assert_eq!(asked.question, "What are React hooks?");
    }

    #[tokio::test]
    async fn test_submit_answer_keyword_path_full_match() {
        let pipeline = pipeline_with_template(None).await;

        let result = pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();

        assert_eq!(result.score, 100);
        assert_eq!(result.evaluation_type, "Keyword (Fallback)");
        assert_eq!(result.matched_keywords.len(), 3);
        assert_eq!(result.average_score, 100.0);
        assert_eq!(result.answered_count, 1);
    }

    #[tokio::test]
    async fn test_padding_invariant() {
        let pipeline = pipeline_with_template(None).await;

        // Submit at index 1 with nothing at index 0
        let result = pipeline
            .submit_answer("room-1", 1, "the virtual dom does diffing before render", None)
            .await
            .unwrap();

        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.scores[0], 0);
        assert_eq!(result.answered_count, 1);
        // average over both slots, placeholder included
        assert_eq!(result.average_score, result.scores[1] as f64 / 2.0);
    }

    #[tokio::test]
    async fn test_average_invariant_across_submissions() {
        let pipeline = pipeline_with_template(None).await;

        pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();
        let result = pipeline
            .submit_answer("room-1", 1, "virtual dom", None)
            .await
            .unwrap();

        let expected_mean = result.scores.iter().map(|&s| s as f64).sum::<f64>()
            / result.scores.len() as f64;
        let expected_mean = (expected_mean * 100.0).round() / 100.0;
        assert_eq!(result.average_score, expected_mean);
    }

    #[tokio::test]
    async fn test_resubmission_overwrites_slot() {
        let pipeline = pipeline_with_template(None).await;

        pipeline.submit_answer("room-1", 0, "wrong answer entirely", None).await.unwrap();
        let result = pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();

        assert_eq!(result.scores.len(), 1);
        assert_eq!(result.score, 100);
        assert_eq!(result.average_score, 100.0);
    }

    #[tokio::test]
    async fn test_fallback_guarantee_when_scorer_fails() {
        let pipeline = pipeline_with_template(Some(Arc::new(FailingScorer))).await;

        let result = pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();

        assert_eq!(result.evaluation_type, "Keyword (Fallback)");
        assert_eq!(result.score, 100);
    }

    #[tokio::test]
    async fn test_ai_scorer_verdict_wins_when_available() {
        let pipeline = pipeline_with_template(Some(Arc::new(FixedScorer(87)))).await;

        let result = pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();

        assert_eq!(result.evaluation_type, "AI");
        assert_eq!(result.score, 87);
        assert_eq!(result.feedback.as_deref(), Some("Good coverage of the fundamentals."));
    }

    #[tokio::test]
    async fn test_rebind_template_moves_room_lookup() {
        let pipeline = pipeline_with_template(None).await;
        let template = pipeline.load_template("room-1").await.unwrap();

        pipeline
            .rebind_template(template.clone(), "room-2".to_string())
            .await
            .unwrap();

        let moved = pipeline.load_template("room-2").await.unwrap();
        assert_eq!(moved.template_id, template.template_id);
        assert!(pipeline.load_template("room-1").await.is_err());
    }

    #[tokio::test]
    async fn test_submit_answer_unknown_template() {
        let pipeline = pipeline_with_template(None).await;
        let err = pipeline
            .submit_answer("room-none", 0, "anything", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_complete_session_flips_status_and_next_answer_starts_fresh() {
        let pipeline = pipeline_with_template(None).await;

        pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();

        let completed = pipeline.complete_session("room-1").await.unwrap().unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
        assert!(completed.end_time.is_some());

        // completing again is a no-op
        assert!(pipeline.complete_session("room-1").await.unwrap().is_none());

        // a later answer opens a new ongoing session
        let result = pipeline
            .submit_answer("room-1", 0, "React hooks manage component state", None)
            .await
            .unwrap();
        assert_eq!(result.scores.len(), 1);
    }
}

//! Pluggable AI answer scorer.
//!
//! The pipeline treats this as best-effort: any transport or parse failure
//! surfaces as `ScorerError` and the caller falls back to keyword matching.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ScorerConfig;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scorer request failed: {0}")]
    Request(String),

    #[error("could not parse scorer response: {0}")]
    Malformed(String),
}

/// Verdict returned by an AI scorer for a single answer.
#[derive(Debug, Clone)]
pub struct AiEvaluation {
    pub score: u8,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub matched_concepts: Vec<String>,
}

#[async_trait]
pub trait AnswerScorer: Send + Sync {
    async fn score_answer(
        &self,
        question: &str,
        answer: &str,
        expected_keywords: &[String],
    ) -> Result<AiEvaluation, ScorerError>;
}

/// Scorer backed by a Gemini-style `generateContent` HTTP API.
pub struct GeminiScorer {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl GeminiScorer {
    /// Returns None when no API key is configured; the server then runs in
    /// permanent keyword-fallback mode.
    pub fn from_config(config: &ScorerConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(question: &str, answer: &str, expected_keywords: &[String]) -> String {
        format!(
            r#"You are an expert technical interviewer evaluating a candidate's answer.

Question: "{question}"

Expected Keywords/Concepts: {keywords}

Candidate's Answer: "{answer}"

Evaluate this answer and provide:
1. A score from 0-100 based on correctness, completeness, and clarity
2. Brief feedback (2-3 sentences)
3. Strengths in the answer
4. Areas for improvement
5. Which expected concepts were covered

Respond ONLY with valid JSON in this exact format:
{{
  "score": <number 0-100>,
  "feedback": "<brief overall feedback>",
  "strengths": ["<strength 1>", "<strength 2>"],
  "improvements": ["<improvement 1>", "<improvement 2>"],
  "matched_concepts": ["<concept 1>", "<concept 2>"]
}}"#,
            question = question,
            answer = answer,
            keywords = expected_keywords.join(", "),
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    matched_concepts: Vec<String>,
}

/// Pulls the first JSON object out of a model response and parses the
/// evaluation verdict. Models wrap JSON in prose or code fences often
/// enough that scanning for the outermost braces is the robust path.
pub(crate) fn parse_evaluation(text: &str) -> Result<AiEvaluation, ScorerError> {
    let start = text
        .find('{')
        .ok_or_else(|| ScorerError::Malformed("no JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| ScorerError::Malformed("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(ScorerError::Malformed("unterminated JSON object".to_string()));
    }

    let raw: RawEvaluation = serde_json::from_str(&text[start..=end])
        .map_err(|e| ScorerError::Malformed(e.to_string()))?;

    Ok(AiEvaluation {
        score: raw.score.clamp(0.0, 100.0).round() as u8,
        feedback: raw.feedback,
        strengths: raw.strengths,
        improvements: raw.improvements,
        matched_concepts: raw.matched_concepts,
    })
}

#[async_trait]
impl AnswerScorer for GeminiScorer {
    async fn score_answer(
        &self,
        question: &str,
        answer: &str,
        expected_keywords: &[String],
    ) -> Result<AiEvaluation, ScorerError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(question, answer, expected_keywords) }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScorerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScorerError::Request(format!(
                "scorer returned status {}: {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::Malformed(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ScorerError::Malformed("empty candidate list".to_string()))?;

        parse_evaluation(text)
    }
}

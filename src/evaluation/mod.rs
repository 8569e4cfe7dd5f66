pub mod keywords;
mod pipeline;
mod scorer;

pub use pipeline::{
    generate_template_id, normalize_questions, AnswerEvaluation, AskedQuestion,
    EvaluationPipeline, QuestionSpec,
};
pub use scorer::{AiEvaluation, AnswerScorer, GeminiScorer, ScorerError};

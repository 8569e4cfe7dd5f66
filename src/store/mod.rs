mod memory;
mod records;

pub use memory::MemoryStore;
pub use records::{
    EvaluationSession, InterviewTemplate, QuestionAnswer, QuestionCategory, QuestionDifficulty,
    QuestionTemplate, SessionStatus, TemplateStatus,
};

use async_trait::async_trait;

use crate::error::Result;

/// Document-store boundary for templates and evaluation sessions.
///
/// The server only relies on find/insert/update primitives; concrete
/// backends (in-memory, a database driver) live behind this trait.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn find_template_by_room(&self, room_id: &str) -> Result<Option<InterviewTemplate>>;

    async fn find_template_by_id(&self, template_id: &str) -> Result<Option<InterviewTemplate>>;

    async fn list_templates(&self) -> Result<Vec<InterviewTemplate>>;

    /// Inserts or fully replaces a template, keyed by `template_id`.
    async fn upsert_template(&self, template: InterviewTemplate) -> Result<()>;

    /// Returns true if a template was removed.
    async fn delete_template(&self, template_id: &str) -> Result<bool>;

    /// The implicit unique key: at most one ongoing session per room.
    async fn find_ongoing_session(&self, room_id: &str) -> Result<Option<EvaluationSession>>;

    /// Inserts or fully replaces a session, keyed by `session_id`.
    async fn upsert_session(&self, session: EvaluationSession) -> Result<()>;
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::records::{EvaluationSession, InterviewTemplate, SessionStatus};
use super::EvaluationStore;
use crate::error::Result;

/// In-memory document store. State lives for the process lifetime.
#[derive(Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<String, InterviewTemplate>>,
    sessions: RwLock<HashMap<String, EvaluationSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn find_template_by_room(&self, room_id: &str) -> Result<Option<InterviewTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.values().find(|t| t.room_id == room_id).cloned())
    }

    async fn find_template_by_id(&self, template_id: &str) -> Result<Option<InterviewTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.get(template_id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<InterviewTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.values().cloned().collect())
    }

    async fn upsert_template(&self, template: InterviewTemplate) -> Result<()> {
        let mut templates = self.templates.write().await;
        templates.insert(template.template_id.clone(), template);
        Ok(())
    }

    async fn delete_template(&self, template_id: &str) -> Result<bool> {
        let mut templates = self.templates.write().await;
        Ok(templates.remove(template_id).is_some())
    }

    async fn find_ongoing_session(&self, room_id: &str) -> Result<Option<EvaluationSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|s| s.room_id == room_id && s.status == SessionStatus::Ongoing)
            .cloned())
    }

    async fn upsert_session(&self, session: EvaluationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TemplateStatus;

    fn template(id: &str, room: &str) -> InterviewTemplate {
        InterviewTemplate::new(id.to_string(), room.to_string(), "Technical Interview".into())
    }

    #[tokio::test]
    async fn test_template_lookup_by_room_and_id() {
        let store = MemoryStore::new();
        store.upsert_template(template("tpl-1", "room-a")).await.unwrap();

        let by_room = store.find_template_by_room("room-a").await.unwrap();
        assert_eq!(by_room.unwrap().template_id, "tpl-1");

        let by_id = store.find_template_by_id("tpl-1").await.unwrap();
        assert_eq!(by_id.unwrap().room_id, "room-a");

        assert!(store.find_template_by_room("room-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_template_replaces() {
        let store = MemoryStore::new();
        store.upsert_template(template("tpl-1", "room-a")).await.unwrap();

        let mut updated = template("tpl-1", "room-a");
        updated.status = TemplateStatus::Ready;
        store.upsert_template(updated).await.unwrap();

        let found = store.find_template_by_id("tpl-1").await.unwrap().unwrap();
        assert_eq!(found.status, TemplateStatus::Ready);
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_template() {
        let store = MemoryStore::new();
        store.upsert_template(template("tpl-1", "room-a")).await.unwrap();

        assert!(store.delete_template("tpl-1").await.unwrap());
        assert!(!store.delete_template("tpl-1").await.unwrap());
        assert!(store.find_template_by_id("tpl-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ongoing_session_is_scoped_by_room_and_status() {
        let store = MemoryStore::new();
        let ongoing = EvaluationSession::new("session-1".into(), "room-a".into());
        store.upsert_session(ongoing).await.unwrap();

        let mut completed = EvaluationSession::new("session-2".into(), "room-b".into());
        completed.status = SessionStatus::Completed;
        store.upsert_session(completed).await.unwrap();

        let found = store.find_ongoing_session("room-a").await.unwrap();
        assert_eq!(found.unwrap().session_id, "session-1");

        // Completed sessions are not "ongoing"
        assert!(store.find_ongoing_session("room-b").await.unwrap().is_none());
    }
}

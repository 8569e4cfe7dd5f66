use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use warp::ws::Message;

use super::clock::MeetingClock;
use super::protocol::{ClientEvent, QuestionInput, ServerEvent};
use super::registry::{DeviceState, RoomRegistry};
use super::relay::SignalingRelay;
use crate::evaluation::{keywords, EvaluationPipeline, QuestionSpec};

/// Shared entry point for all websocket connections: room membership,
/// signaling relay, the meeting clock and the evaluation pipeline.
pub struct SessionGateway {
    registry: Arc<RoomRegistry>,
    relay: SignalingRelay,
    clock: Arc<MeetingClock>,
    pipeline: Arc<EvaluationPipeline>,
}

impl SessionGateway {
    pub fn new(
        registry: Arc<RoomRegistry>,
        clock: Arc<MeetingClock>,
        pipeline: Arc<EvaluationPipeline>,
    ) -> Arc<Self> {
        let relay = SignalingRelay::new(Arc::clone(&registry));
        Arc::new(Self {
            registry,
            relay,
            clock,
            pipeline,
        })
    }

    pub fn handler(
        self: &Arc<Self>,
        sender: mpsc::UnboundedSender<Message>,
    ) -> SessionHandler {
        SessionHandler {
            gateway: Arc::clone(self),
            conn_id: generate_conn_id(),
            sender,
            room_id: None,
        }
    }
}

/// Per-connection state machine. One handler lives for the duration of a
/// websocket connection and tracks which room the socket has joined.
pub struct SessionHandler {
    gateway: Arc<SessionGateway>,
    conn_id: String,
    sender: mpsc::UnboundedSender<Message>,
    room_id: Option<String>,
}

impl SessionHandler {
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(room_id).await,

            ClientEvent::Offer { room_id, offer } => {
                self.gateway.relay.relay_offer(&room_id, &self.conn_id, offer).await;
            }
            ClientEvent::Answer { room_id, answer } => {
                self.gateway.relay.relay_answer(&room_id, &self.conn_id, answer).await;
            }
            ClientEvent::IceCandidate { room_id, candidate } => {
                self.gateway
                    .relay
                    .relay_ice_candidate(&room_id, &self.conn_id, candidate)
                    .await;
            }

            ClientEvent::InterviewerToggle { cam_on, mic_on } => {
                let Some(room_id) = self.require_room() else { return };
                let state = DeviceState { cam_on, mic_on };
                self.gateway.registry.set_interviewer_state(&room_id, state).await;
                self.gateway
                    .registry
                    .broadcast(&room_id, &ServerEvent::UpdateInterviewer { cam_on, mic_on })
                    .await;
            }
            ClientEvent::ParticipantToggle { cam_on, mic_on } => {
                let Some(room_id) = self.require_room() else { return };
                let state = DeviceState { cam_on, mic_on };
                self.gateway.registry.set_participant_state(&room_id, state).await;
                self.gateway
                    .registry
                    .broadcast(&room_id, &ServerEvent::UpdateParticipant { cam_on, mic_on })
                    .await;
            }

            ClientEvent::StartMeeting => {
                let Some(room_id) = self.require_room() else { return };
                self.gateway.clock.start(&room_id).await;
            }
            ClientEvent::EndMeeting => {
                let Some(room_id) = self.require_room() else { return };
                self.end_meeting(&room_id).await;
            }

            ClientEvent::NewQuestion { question } => {
                let Some(room_id) = self.require_room() else { return };
                let (question, mut keywords) = question.into_parts();
                if keywords.is_empty() {
                    keywords = keywords::extract_keywords(&question);
                }
                self.gateway
                    .registry
                    .broadcast(&room_id, &ServerEvent::NewQuestion { question, keywords })
                    .await;
            }

            ClientEvent::SaveInterviewTemplate {
                room_id,
                title,
                questions,
            } => self.save_template(room_id, title, questions).await,

            ClientEvent::GetInterviewTemplate { room_id } => {
                let result = self.gateway.pipeline.load_template(&room_id).await;
                self.send_template_result(result);
            }

            ClientEvent::LoadTemplateById { template_id, room_id } => {
                self.load_template_by_id(template_id, room_id).await;
            }

            ClientEvent::AskQuestion {
                room_id,
                question_index,
                template_id,
            } => self.ask_question(room_id, question_index, template_id).await,

            ClientEvent::SubmitAnswer {
                room_id,
                question_index,
                answer,
                template_id,
            } => {
                self.submit_answer(room_id, question_index, answer, template_id)
                    .await
            }
        }
    }

    async fn join_room(&mut self, room_id: String) {
        let outcome = self
            .gateway
            .registry
            .join(&room_id, &self.conn_id, self.sender.clone())
            .await;

        if outcome.newly_joined {
            self.gateway
                .registry
                .send_to_others(
                    &room_id,
                    &self.conn_id,
                    &ServerEvent::UserJoined {
                        peer_id: self.conn_id.clone(),
                    },
                )
                .await;
        }

        // Late joiners get the current room state straight away instead of
        // waiting for the next toggle or clock tick.
        self.send(&ServerEvent::UpdateInterviewer {
            cam_on: outcome.interviewer_state.cam_on,
            mic_on: outcome.interviewer_state.mic_on,
        });
        self.send(&ServerEvent::UpdateParticipant {
            cam_on: outcome.participant_state.cam_on,
            mic_on: outcome.participant_state.mic_on,
        });
        let (meeting_state, elapsed_seconds) = self.gateway.clock.status(&room_id).await;
        self.send(&ServerEvent::MeetingStatus {
            meeting_state,
            elapsed_seconds,
        });

        self.room_id = Some(room_id);
    }

    /// Ending the meeting also closes the room's ongoing evaluation
    /// session, so a later meeting starts from a clean sheet.
    async fn end_meeting(&self, room_id: &str) {
        self.gateway.clock.stop(room_id).await;

        match self.gateway.pipeline.complete_session(room_id).await {
            Ok(Some(session)) => {
                self.gateway
                    .registry
                    .broadcast(
                        room_id,
                        &ServerEvent::SessionCompleted {
                            average_score: session.average_score,
                            total_questions: session.total_questions,
                        },
                    )
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, "Failed to complete session");
            }
        }
    }

    async fn save_template(
        &self,
        room_id: String,
        title: Option<String>,
        questions: Vec<QuestionInput>,
    ) {
        let specs: Vec<QuestionSpec> = questions
            .into_iter()
            .map(|q| QuestionSpec {
                question: q.question,
                keywords: q.keywords,
                category: q.category,
                difficulty: q.difficulty,
            })
            .collect();

        match self.gateway.pipeline.save_template(&room_id, title, specs).await {
            Ok(template) => self.send(&ServerEvent::TemplateSaved {
                success: true,
                room_id: Some(room_id),
                question_count: Some(template.questions.len()),
                error: None,
            }),
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, "Failed to save template");
                self.send(&ServerEvent::TemplateSaved {
                    success: false,
                    room_id: None,
                    question_count: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    /// Loading by id optionally rebinds the template to a room so that
    /// subsequent room-keyed asks resolve to it.
    async fn load_template_by_id(&self, template_id: String, room_id: Option<String>) {
        let result = match self.gateway.pipeline.load_template_by_id(&template_id).await {
            Ok(template) => match room_id {
                Some(room_id) if room_id != template.room_id => {
                    self.gateway.pipeline.rebind_template(template, room_id).await
                }
                _ => Ok(template),
            },
            Err(e) => Err(e),
        };
        self.send_template_result(result);
    }

    fn send_template_result(&self, result: crate::error::Result<crate::store::InterviewTemplate>) {
        match result {
            Ok(template) => self.send(&ServerEvent::TemplateLoaded {
                success: true,
                template_id: Some(template.template_id),
                title: Some(template.title),
                questions: Some(template.questions),
                status: Some(template.status),
                message: None,
            }),
            Err(e) => self.send(&ServerEvent::TemplateLoaded {
                success: false,
                template_id: None,
                title: None,
                questions: None,
                status: None,
                message: Some(e.to_string()),
            }),
        }
    }

    async fn ask_question(
        &self,
        room_id: String,
        question_index: usize,
        template_id: Option<String>,
    ) {
        match self
            .gateway
            .pipeline
            .ask_question(&room_id, question_index, template_id.as_deref())
            .await
        {
            Ok(asked) => {
                self.gateway
                    .registry
                    .broadcast(
                        &room_id,
                        &ServerEvent::ReceiveQuestion {
                            question_index: asked.question_index,
                            question: asked.question.clone(),
                            total_questions: asked.total_questions,
                        },
                    )
                    .await;
                self.send(&ServerEvent::QuestionSent {
                    question_index: asked.question_index,
                    question: asked.question,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => self.send(&ServerEvent::QuestionError {
                message: e.to_string(),
            }),
        }
    }

    async fn submit_answer(
        &self,
        room_id: String,
        question_index: usize,
        answer: String,
        template_id: Option<String>,
    ) {
        match self
            .gateway
            .pipeline
            .submit_answer(&room_id, question_index, &answer, template_id.as_deref())
            .await
        {
            Ok(evaluation) => {
                self.gateway
                    .registry
                    .broadcast(
                        &room_id,
                        &ServerEvent::AnswerEvaluated {
                            question_index: evaluation.question_index,
                            score: evaluation.score,
                            matched_keywords: evaluation.matched_keywords,
                            participant_keywords: evaluation.participant_keywords,
                            match_percentage: evaluation.match_percentage,
                            average_score: evaluation.average_score,
                            total_questions: evaluation.answered_count,
                            evaluation_type: evaluation.evaluation_type,
                            feedback: evaluation.feedback,
                            strengths: evaluation.strengths,
                            improvements: evaluation.improvements,
                        },
                    )
                    .await;
                self.gateway
                    .registry
                    .broadcast(
                        &room_id,
                        &ServerEvent::ScoresUpdated {
                            average_score: evaluation.average_score,
                            total_questions: evaluation.scores.len(),
                            scores: evaluation.scores,
                        },
                    )
                    .await;
                self.send(&ServerEvent::AnswerSubmitted {
                    success: true,
                    question_index: Some(question_index),
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(
                    room_id = %room_id,
                    question_index = question_index,
                    error = %e,
                    "Answer submission rejected"
                );
                self.send(&ServerEvent::AnswerSubmitted {
                    success: false,
                    question_index: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    /// Runs when the websocket closes: removes the connection from its
    /// room and halts the meeting ticker if the room is now empty.
    pub async fn cleanup(&mut self) {
        if let Some(outcome) = self.gateway.registry.leave(&self.conn_id).await {
            if outcome.remaining == 0 {
                self.gateway.clock.halt(&outcome.room_id).await;
            }
        }
        self.room_id = None;
    }

    fn require_room(&self) -> Option<String> {
        match &self.room_id {
            Some(room_id) => Some(room_id.clone()),
            None => {
                self.send(&ServerEvent::Error {
                    message: "Join a room first".to_string(),
                });
                None
            }
        }
    }

    pub fn send(&self, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(text) => {
                if self.sender.send(Message::text(text)).is_err() {
                    tracing::debug!(conn_id = %self.conn_id, "Send to closed connection dropped");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server event");
            }
        }
    }
}

fn generate_conn_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("conn-{}", suffix)
}

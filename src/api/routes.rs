use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::Filter;

use super::websocket;
use crate::evaluation::{generate_template_id, normalize_questions, QuestionSpec};
use crate::session::protocol::QuestionInput;
use crate::session::SessionGateway;
use crate::store::{EvaluationStore, InterviewTemplate, TemplateStatus};

/// All HTTP and websocket routes for the server.
pub fn routes(
    gateway: Arc<SessionGateway>,
    store: Arc<dyn EvaluationStore>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    websocket_route(gateway)
        .or(health_check())
        .or(template_routes(store))
}

pub fn websocket_route(
    gateway: Arc<SessionGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_gateway(gateway))
        .map(|ws: warp::ws::Ws, gateway: Arc<SessionGateway>| {
            ws.on_upgrade(move |websocket| websocket::handle_websocket(websocket, gateway))
        })
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "healthy",
                "service": "Interview Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

/// Template CRUD for the interviewer dashboard.
pub fn template_routes(
    store: Arc<dyn EvaluationStore>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let list = warp::path("templates")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handle_list_templates);

    let get = warp::path!("templates" / String)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(handle_get_template);

    let create = warp::path("templates")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_store(store.clone()))
        .and_then(handle_create_template);

    let delete = warp::path!("templates" / String)
        .and(warp::delete())
        .and(with_store(store))
        .and_then(handle_delete_template);

    list.or(get).or(create).or(delete)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTemplateRequest {
    #[serde(default)]
    title: Option<String>,
    questions: Vec<QuestionInput>,
}

type JsonReply = warp::reply::WithStatus<warp::reply::Json>;

/// In-progress templates are hidden from the dashboard list.
async fn handle_list_templates(store: Arc<dyn EvaluationStore>) -> Result<JsonReply, Infallible> {
    match store.list_templates().await {
        Ok(mut templates) => {
            templates.retain(|t| t.status != TemplateStatus::InProgress);
            templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let summaries: Vec<serde_json::Value> = templates
                .iter()
                .map(|t| {
                    json!({
                        "id": t.template_id,
                        "title": t.title,
                        "questionCount": t.questions.len(),
                        "status": t.status,
                        "createdAt": t.created_at,
                    })
                })
                .collect();
            Ok(ok_json(json!({ "success": true, "templates": summaries })))
        }
        Err(e) => Ok(internal_error(e.to_string())),
    }
}

async fn handle_get_template(
    template_id: String,
    store: Arc<dyn EvaluationStore>,
) -> Result<JsonReply, Infallible> {
    match store.find_template_by_id(&template_id).await {
        Ok(Some(template)) => Ok(ok_json(json!({ "success": true, "template": template }))),
        Ok(None) => Ok(not_found()),
        Err(e) => Ok(internal_error(e.to_string())),
    }
}

async fn handle_create_template(
    request: CreateTemplateRequest,
    store: Arc<dyn EvaluationStore>,
) -> Result<JsonReply, Infallible> {
    let specs: Vec<QuestionSpec> = request
        .questions
        .into_iter()
        .map(|q| QuestionSpec {
            question: q.question,
            keywords: q.keywords,
            category: q.category,
            difficulty: q.difficulty,
        })
        .collect();

    // Dashboard-created templates get a synthetic room id; they are bound
    // to a live room later via load-template-by-id.
    let mut template = InterviewTemplate::new(
        generate_template_id(),
        format!("template-{}", Utc::now().timestamp_millis()),
        request
            .title
            .unwrap_or_else(|| "Technical Interview".to_string()),
    );
    template.questions = normalize_questions(specs);
    template.status = TemplateStatus::Ready;

    match store.upsert_template(template.clone()).await {
        Ok(()) => {
            tracing::info!(
                template_id = %template.template_id,
                question_count = template.questions.len(),
                "Template created via HTTP"
            );
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({
                    "success": true,
                    "templateId": template.template_id,
                    "message": "Interview template created successfully"
                })),
                StatusCode::CREATED,
            ))
        }
        Err(e) => Ok(internal_error(e.to_string())),
    }
}

async fn handle_delete_template(
    template_id: String,
    store: Arc<dyn EvaluationStore>,
) -> Result<JsonReply, Infallible> {
    match store.delete_template(&template_id).await {
        Ok(true) => {
            tracing::info!(template_id = %template_id, "Template deleted via HTTP");
            Ok(ok_json(json!({
                "success": true,
                "message": "Template deleted"
            })))
        }
        Ok(false) => Ok(not_found()),
        Err(e) => Ok(internal_error(e.to_string())),
    }
}

fn ok_json(body: serde_json::Value) -> JsonReply {
    warp::reply::with_status(warp::reply::json(&body), StatusCode::OK)
}

fn not_found() -> JsonReply {
    warp::reply::with_status(
        warp::reply::json(&json!({ "success": false, "error": "Template not found" })),
        StatusCode::NOT_FOUND,
    )
}

fn internal_error(message: String) -> JsonReply {
    tracing::error!(error = %message, "Template route failed");
    warp::reply::with_status(
        warp::reply::json(&json!({ "success": false, "error": message })),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

fn with_store(
    store: Arc<dyn EvaluationStore>,
) -> impl Filter<Extract = (Arc<dyn EvaluationStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_gateway(
    gateway: Arc<SessionGateway>,
) -> impl Filter<Extract = (Arc<SessionGateway>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> Arc<dyn EvaluationStore> {
        Arc::new(MemoryStore::new())
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = warp::test::request()
            .path("/health")
            .reply(&health_check())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["status"], "healthy");
    }

    #[tokio::test]
    async fn test_template_crud_round() {
        let routes = template_routes(store());

        let response = warp::test::request()
            .method("POST")
            .path("/templates")
            .json(&json!({
                "title": "Rust Interview",
                "questions": [
                    {"question": "What is ownership?", "keywords": ["ownership"]}
                ]
            }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(&response);
        assert_eq!(created["success"], true);
        let template_id = created["templateId"].as_str().unwrap().to_string();

        let response = warp::test::request()
            .path("/templates")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body(&response);
        assert_eq!(listed["templates"][0]["id"], template_id.as_str());
        assert_eq!(listed["templates"][0]["title"], "Rust Interview");
        assert_eq!(listed["templates"][0]["questionCount"], 1);

        let response = warp::test::request()
            .path(&format!("/templates/{}", template_id))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["template"]["status"], "ready");

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/templates/{}", template_id))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = warp::test::request()
            .path(&format!("/templates/{}", template_id))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["success"], false);
    }

    #[tokio::test]
    async fn test_delete_unknown_template_is_404() {
        let response = warp::test::request()
            .method("DELETE")
            .path("/templates/tpl-missing")
            .reply(&template_routes(store()))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_hides_in_progress_templates() {
        let store = store();
        let mut hidden = InterviewTemplate::new(
            "tpl-hidden".to_string(),
            "room-x".to_string(),
            "Hidden".to_string(),
        );
        hidden.status = TemplateStatus::InProgress;
        store.upsert_template(hidden).await.unwrap();

        let mut visible = InterviewTemplate::new(
            "tpl-visible".to_string(),
            "room-y".to_string(),
            "Visible".to_string(),
        );
        visible.status = TemplateStatus::Ready;
        store.upsert_template(visible).await.unwrap();

        let response = warp::test::request()
            .path("/templates")
            .reply(&template_routes(store))
            .await;

        let listed = body(&response);
        let templates = listed["templates"].as_array().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0]["id"], "tpl-visible");
    }
}

mod api;
mod config;
mod error;
mod evaluation;
mod session;
mod store;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::Config;
use evaluation::{AnswerScorer, EvaluationPipeline, GeminiScorer};
use session::{MeetingClock, RoomRegistry, SessionGateway};
use store::{EvaluationStore, MemoryStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store: Arc<dyn EvaluationStore> = Arc::new(MemoryStore::new());

    let scorer: Option<Arc<dyn AnswerScorer>> = match GeminiScorer::from_config(&config.scorer) {
        Some(scorer) => {
            tracing::info!(model = %config.scorer.model, "AI answer scorer enabled");
            Some(Arc::new(scorer))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, answers will be scored by keyword matching only");
            None
        }
    };

    let registry = RoomRegistry::new();
    let clock = MeetingClock::new(Arc::clone(&registry));
    let pipeline = Arc::new(EvaluationPipeline::new(Arc::clone(&store), scorer));
    let gateway = SessionGateway::new(registry, clock, pipeline);

    let routes = api::routes(gateway, store);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Interview server listening"
    );

    warp::serve(routes).run(config.bind_address()).await;
}

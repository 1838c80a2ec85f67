//! Voice interview demo: live microphone to Gemini and back.
//!
//! Requires `GEMINI_API_KEY` in the environment or a `.env` file. Set
//! `SMARTDRAFT_DB_URL` / `SMARTDRAFT_DB_KEY` and `SMARTDRAFT_DEPARTMENT` to
//! include reference material from the document store. Speak, pause for
//! 1.5 s to end your turn, and the agent answers; when the interview is
//! complete the gathered fields print as JSON.

use smartdraft_voice::{
    DocumentType, LiveSession, NullReferenceSource, ReferenceSource, RestReferenceSource,
    SessionConfig,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = SessionConfig::from_env()?;
    config.document_type = Some(DocumentType::ActivityProposal);

    let reference: Arc<dyn ReferenceSource> = match RestReferenceSource::from_env() {
        Ok(source) => {
            info!("Reference store configured, similar documents will be included.");
            Arc::new(source)
        }
        Err(_) => {
            info!("No reference store configured (SMARTDRAFT_DB_URL / SMARTDRAFT_DB_KEY).");
            Arc::new(NullReferenceSource)
        }
    };

    let mut session = LiveSession::new(config, reference);
    session
        .connect(Box::new(|data| {
            info!(
                "Interview complete:\n{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(data))
                    .unwrap_or_default()
            );
        }))
        .await?;

    info!("Session live. Speak into the microphone, Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    session.disconnect();
    Ok(())
}

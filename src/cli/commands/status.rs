//! Backend health.

use ocrflow::workflow::Outcome;
use ocrflow::{Config, HttpRecognitionClient, RecognitionService};

use crate::cli::helpers::print_outcome;

pub async fn cmd_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let client = HttpRecognitionClient::new(&config.server_url, config.request_timeout())?;
    let health = client
        .health()
        .await
        .map_err(|e| anyhow::anyhow!("Backend at {} unavailable: {}", config.server_url, e))?;

    if json {
        let value = serde_json::json!({
            "server": config.server_url,
            "status": health.status,
            "model_loaded": health.model_loaded,
            "model_healthy": health.model_healthy,
            "active_tasks": health.active_tasks,
            "preprocess_tasks": health.preprocess_tasks,
            "video_tasks": health.video_tasks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_outcome(&Outcome::Health(health));
    }
    Ok(())
}

use course_video_bot::config::Settings;
use course_video_bot::logging::{init_logging, RedactionPatterns};
use course_video_bot::runner::run_bot;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting course video bot...");

    let settings = init_settings();

    if let Err(e) = run_bot(settings).await {
        error!("Bot terminated with error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

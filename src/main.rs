use cinematch::config::Config;
use cinematch::AppState;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: cinematch [train | clear-cache | recommend <user-id>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cinematch=info")),
        )
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "train".to_string());

    // Load configuration and wire up storage
    let config = Config::from_env()?;
    let state = AppState::from_config(&config).await?;

    match command.as_str() {
        "train" => {
            tracing::info!("Training model...");
            let report = state.train().await?;
            tracing::info!(
                items = report.items,
                users = report.users,
                "Model trained and saved successfully"
            );
        }
        "clear-cache" => {
            state.invalidate_cache().await?;
        }
        "recommend" => {
            let user_id = std::env::args()
                .nth(2)
                .and_then(|arg| arg.parse::<i64>().ok())
                .ok_or_else(|| anyhow::anyhow!("{}", USAGE))?;
            for scored in state.recommend_for_user(user_id).await? {
                tracing::info!(
                    user_id,
                    item_id = scored.item.id,
                    title = %scored.item.title,
                    score = ?scored.score,
                    "Recommended"
                );
            }
        }
        other => {
            tracing::error!(command = %other, "Unknown command");
            anyhow::bail!("{}", USAGE);
        }
    }

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::SystemClock;
use tracing::{Level, info};

use server::config::AppConfig;
use server::services::classification::Classifier;
use server::services::notify::{Notifier, connect_queue};
use server::state::AppState;
use server::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let store: Arc<dyn Store> = match config.database.url.as_deref() {
        Some(url) => {
            let db = server::database::init_db(url)
                .await
                .context("failed to initialize database")?;
            server::database::ensure_indexes(&db).await?;
            info!("Using PostgreSQL store");
            Arc::new(PgStore::new(db))
        }
        None => {
            info!("No database URL configured, keeping data in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let clock = Arc::new(SystemClock);
    let mut notifier = Notifier::new(clock.clone());
    if let Some(mq) = connect_queue(&config.mq).await {
        notifier = notifier.with_queue(mq, config.mq.queue_name.clone());
    }

    info!(
        mode = ?config.submission.classification_mode,
        media_root = %config.submission.media_root.display(),
        "Proof classification configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let state = AppState {
        classifier: Classifier::from_config(&config.submission),
        config: Arc::new(config),
        store,
        clock,
        notifier,
    };

    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

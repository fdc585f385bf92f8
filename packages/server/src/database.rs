use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::submission;

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Create the composite indexes the admission and review paths query by.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Admission count:
    // SELECT COUNT(*) FROM submission WHERE event_id = ? AND user_id = ?
    let by_participant = Index::create()
        .if_not_exists()
        .name("idx_submission_event_user")
        .table(submission::Entity)
        .col(submission::Column::EventId)
        .col(submission::Column::UserId)
        .to_string(PostgresQueryBuilder);

    // Review queue, reranking and stats filter on status per event.
    let by_status = Index::create()
        .if_not_exists()
        .name("idx_submission_event_status")
        .table(submission::Entity)
        .col(submission::Column::EventId)
        .col(submission::Column::Status)
        .to_string(PostgresQueryBuilder);

    for (name, stmt) in [
        ("idx_submission_event_user", by_participant),
        ("idx_submission_event_status", by_status),
    ] {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}

//! Outbox Store: the canonical relational tables (`outbox_commands`,
//! `outbox_projector_state`, `http_idempotency`, `event_dlq`, and the
//! read-model tables) plus the invariants governing command status and
//! checkpoint monotonicity

pub mod checkpoint;
pub mod error;
pub mod fake;
pub mod models;
pub mod schema;
pub mod store;

pub use checkpoint::{advances, Checkpoint};
pub use error::StoreError;
pub use store::{is_expired, OutboxStore};

#[cfg(feature = "postgres")]
pub use store::postgres::PgOutboxStore;

/// Embedded at compile time so `bin/bridge` can run migrations at startup
/// without shelling out to `diesel migration run`
#[cfg(feature = "postgres")]
pub const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("./migrations");

/// Runs every pending embedded migration against `database_url`. Diesel's
/// migration harness is synchronous, so this bridges onto the async
/// connection via `AsyncConnectionWrapper` inside a blocking task rather
/// than pulling in a second, sync Postgres driver.
#[cfg(feature = "postgres")]
pub async fn run_migrations(database_url: &str) -> Result<(), StoreError> {
    use diesel::Connection;
    use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
    use diesel_async::AsyncPgConnection;
    use diesel_migrations::MigrationHarness;

    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|_| ())
            .map_err(|e| StoreError::Migration(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Migration(e.to_string()))?
}

use potion::HtmlError;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::Config, error::QueryError};

pub async fn connect(config: &Config) -> Result<Pool<Postgres>, potion::Error> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| HtmlError::InternalServerError.new("DATABASE_URL is not set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .map_err(QueryError::from)?;

    log::info!(
        "Connected to database with {} max connections",
        config.max_connections
    );

    Ok(pool)
}

pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| QueryError::from(sqlx::Error::from(e)))?;

    log::info!("Database migrations applied");

    Ok(())
}

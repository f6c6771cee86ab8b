use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};

use crate::{
    constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    form::Form,
    images::DiskImageStore,
    jwt::SessionKeys,
    pagination::Pagination,
};

const DEVELOPMENT_SECRET: &str = "development-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub media_root: String,
    pub page_size: i64,
}

impl Config {
    /// Reads the environment, loading `.env` first when present.
    pub fn load() -> Self {
        if dotenv::dotenv().is_ok() {
            info!("Loaded environment from .env");
        }

        let session_secret = var("SESSION_SECRET").unwrap_or_else(|_| {
            warn!("SESSION_SECRET not set, using the development secret");
            DEVELOPMENT_SECRET.to_string()
        });

        Self {
            database_url: var("DATABASE_URL").ok(),
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", 5),
            session_secret,
            session_ttl_hours: try_load("SESSION_TTL_HOURS", 24),
            media_root: try_load("MEDIA_ROOT", String::from("media")),
            page_size: try_load("PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn session_keys(&self) -> SessionKeys {
        SessionKeys::new(&self.session_secret, self.session_ttl_hours)
    }

    pub fn image_store(&self) -> DiskImageStore {
        DiskImageStore::new(&self.media_root)
    }

    /// Pagination of a listing request, defaulting to the configured page size.
    pub fn pagination(&self, form: &Form) -> Pagination {
        Pagination::from_form(form, self.page_size)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

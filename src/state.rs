use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::token::TokenService;
use crate::config::Config;
use crate::db::{ProfileRepository, SqliteProfileRepository, SqliteUserRepository, UserRepository};
use crate::geocoding::{Geocoder, OpenCageGeocoder};
use crate::profiles::{PhotoStore, ProfileService};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    /// Wires the production stack: SQLite stores, OpenCage geocoder and the
    /// on-disk photo directory. Fails if the signing secret is missing.
    pub fn build(config: Config, pool: DbPool) -> anyhow::Result<Self> {
        let geocoder = OpenCageGeocoder::new(
            config.geocoding.endpoint.clone(),
            config.geocoding.api_key.clone(),
            Duration::from_secs(config.geocoding.timeout_secs),
        )?;
        if config.geocoding.api_key.is_none() {
            tracing::warn!("No geocoding API key configured; profile writes will fail");
        }

        Self::with_parts(
            config,
            Arc::new(SqliteUserRepository::new(pool.clone())),
            Arc::new(SqliteProfileRepository::new(pool)),
            Arc::new(geocoder),
        )
    }

    /// Wires the state from explicit collaborators.
    pub fn with_parts(
        config: Config,
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        geocoder: Arc<dyn Geocoder>,
    ) -> anyhow::Result<Self> {
        let tokens = TokenService::from_config(&config.auth)?;
        let photos = PhotoStore::new(config.uploads_path(), config.storage.max_photo_bytes);
        let service = ProfileService::new(profiles, geocoder, photos);

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            users,
            profiles: Arc::new(service),
        })
    }
}

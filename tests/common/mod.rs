#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use geoprofiles::config::Config;
use geoprofiles::db::models::{Coordinates, PostalAddress, Profile};
use geoprofiles::db::{
    self, ProfileRepository, RepositoryError, SqliteProfileRepository, SqliteUserRepository,
};
use geoprofiles::geocoding::{GeocodeError, Geocoder};
use geoprofiles::routes;
use geoprofiles::state::AppState;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "hunter22";

/// Geocoder that answers from memory. `None` makes every lookup fail.
pub struct StubGeocoder {
    coords: Mutex<Option<Coordinates>>,
    pub calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn set(&self, coords: Option<Coordinates>) {
        *self.coords.lock().unwrap() = coords;
    }
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn lookup(&self, _address: &PostalAddress) -> Result<Coordinates, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (*self.coords.lock().unwrap()).ok_or(GeocodeError::NoResults)
    }
}

/// Counts every call before delegating to SQLite, so tests can prove a
/// rejected request never reached the store.
pub struct RecordingProfileRepository {
    inner: SqliteProfileRepository,
    pub calls: AtomicUsize,
}

impl RecordingProfileRepository {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileRepository for RecordingProfileRepository {
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        self.hit();
        self.inner.list().await
    }

    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        self.hit();
        self.inner.get(id).await
    }

    async fn insert(&self, profile: &Profile) -> Result<(), RepositoryError> {
        self.hit();
        self.inner.insert(profile).await
    }

    async fn update(
        &self,
        profile: &Profile,
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        self.hit();
        self.inner.update(profile, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        self.hit();
        self.inner.delete(id).await
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub geocoder: Arc<StubGeocoder>,
    pub profiles: Arc<RecordingProfileRepository>,
    pub uploads: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("uploads"));
        config.storage.max_photo_bytes = 64 * 1024;
        config.auth.jwt_secret = Some("integration-test-secret".into());
        config.auth.bcrypt_cost = 4;

        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();

        let geocoder = Arc::new(StubGeocoder {
            coords: Mutex::new(Some(Coordinates {
                lat: 37.33,
                lng: -122.03,
            })),
            calls: AtomicUsize::new(0),
        });
        let profiles = Arc::new(RecordingProfileRepository {
            inner: SqliteProfileRepository::new(pool.clone()),
            calls: AtomicUsize::new(0),
        });
        let uploads = config.uploads_path();

        let state = AppState::with_parts(
            config,
            Arc::new(SqliteUserRepository::new(pool)),
            profiles.clone(),
            geocoder.clone(),
        )
        .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            geocoder,
            profiles,
            uploads,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn store_calls(&self) -> usize {
        self.profiles.calls.load(Ordering::SeqCst)
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocoder.calls.load(Ordering::SeqCst)
    }

    pub fn stored_photos(&self) -> usize {
        std::fs::read_dir(&self.uploads)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// A client that keeps cookies between requests, like a browser.
    pub fn browser() -> reqwest::Client {
        reqwest::Client::builder().cookie_store(true).build().unwrap()
    }

    pub async fn register(&self, client: &reqwest::Client, email: &str, role: &str) -> Value {
        let res = client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": email.split('@').next().unwrap(),
                "email": email,
                "password": PASSWORD,
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        res.json().await.unwrap()
    }

    /// Registers an admin and returns a client carrying the session cookie.
    pub async fn admin(&self) -> reqwest::Client {
        let client = Self::browser();
        self.register(&client, ADMIN_EMAIL, "admin").await;
        client
    }

    pub async fn user(&self) -> reqwest::Client {
        let client = Self::browser();
        self.register(&client, USER_EMAIL, "user").await;
        client
    }
}

pub fn png(name: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(b"\x89PNG\r\n\x1a\nfake".to_vec())
        .file_name(name.to_string())
        .mime_str("image/png")
        .unwrap()
}

pub fn profile_form() -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("name", "Apple Park")
        .text("description", "Headquarters")
        .text("address[street]", "1 Infinite Loop")
        .text("address[city]", "Cupertino")
        .text("address[state]", "CA")
        .text("address[country]", "USA")
        .part("photo", png("hq.png"))
}

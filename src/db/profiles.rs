use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{Address, Coordinates, Profile};
use crate::db::users::{format_timestamp, parse_timestamp};
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Profile store.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// All profiles, oldest first.
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError>;

    async fn insert(&self, profile: &Profile) -> Result<(), RepositoryError>;

    /// Overwrites the stored row only if its version still equals
    /// `expected_version`. Returns false when nothing was written.
    async fn update(&self, profile: &Profile, expected_version: i64)
        -> Result<bool, RepositoryError>;

    /// Returns false when no row had that id.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;
}

pub struct SqliteProfileRepository {
    pool: DbPool,
}

impl SqliteProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_PROFILE: &str = "SELECT id, name, description, photo, street, city, state, country,
        lat, lng, version, created_at FROM profiles";

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at, id", SELECT_PROFILE))?;
        let rows = stmt
            .query_map([], raw_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawProfile::into_profile).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_PROFILE),
                params![id],
                raw_profile,
            )
            .optional()?;
        row.map(RawProfile::into_profile).transpose()
    }

    async fn insert(&self, profile: &Profile) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let address = &profile.address;
        conn.execute(
            "INSERT INTO profiles
               (id, name, description, photo, street, city, state, country, lat, lng, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                profile.id,
                profile.name,
                profile.description,
                profile.photo,
                address.street,
                address.city,
                address.state,
                address.country,
                address.coordinates.lat,
                address.coordinates.lng,
                profile.version,
                format_timestamp(&profile.created_at),
            ],
        )
        .map_err(|e| RepositoryError::from_write(e, "Profile already exists"))?;
        Ok(())
    }

    async fn update(
        &self,
        profile: &Profile,
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let address = &profile.address;
        let rows = conn.execute(
            "UPDATE profiles SET
               name = ?2, description = ?3, photo = ?4,
               street = ?5, city = ?6, state = ?7, country = ?8,
               lat = ?9, lng = ?10, version = ?11
             WHERE id = ?1 AND version = ?12",
            params![
                profile.id,
                profile.name,
                profile.description,
                profile.photo,
                address.street,
                address.city,
                address.state,
                address.country,
                address.coordinates.lat,
                address.coordinates.lng,
                profile.version,
                expected_version,
            ],
        )?;
        Ok(rows > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

struct RawProfile {
    id: String,
    name: String,
    description: String,
    photo: String,
    street: String,
    city: String,
    state: Option<String>,
    country: String,
    lat: f64,
    lng: f64,
    version: i64,
    created_at: String,
}

fn raw_profile(row: &Row<'_>) -> rusqlite::Result<RawProfile> {
    Ok(RawProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        photo: row.get(3)?,
        street: row.get(4)?,
        city: row.get(5)?,
        state: row.get(6)?,
        country: row.get(7)?,
        lat: row.get(8)?,
        lng: row.get(9)?,
        version: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl RawProfile {
    fn into_profile(self) -> Result<Profile, RepositoryError> {
        Ok(Profile {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            photo: self.photo,
            address: Address {
                street: self.street,
                city: self.city,
                state: self.state,
                country: self.country,
                coordinates: Coordinates {
                    lat: self.lat,
                    lng: self.lng,
                },
            },
            version: self.version,
        })
    }
}

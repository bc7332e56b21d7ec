use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::models::{Coordinates, Profile};
use crate::db::{ProfileRepository, RepositoryError};
use crate::geocoding::{GeocodeError, Geocoder};
use crate::profiles::form::{non_blank, required, AddressInput};
use crate::profiles::photos::{PhotoStore, PhotoUpload};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{0}")]
    Validation(String),

    #[error("Profile not found")]
    NotFound,

    #[error("Profile was modified by another request")]
    Conflict,

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Photo storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub struct NewProfile {
    pub name: String,
    pub description: String,
    pub address: AddressInput,
    pub photo: Option<PhotoUpload>,
}

/// Partial update. `None` leaves the stored value alone; so does a blank
/// name or description.
#[derive(Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<AddressInput>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub map_url: String,
}

impl From<Coordinates> for Location {
    fn from(c: Coordinates) -> Self {
        Self {
            lat: c.lat,
            lng: c.lng,
            map_url: format!("https://www.google.com/maps?q={},{}", c.lat, c.lng),
        }
    }
}

/// Orchestrates the profile lifecycle across the store, the geocoder and
/// the photo directory.
///
/// Side effects are ordered cheapest-to-undo last: geocode, then write the
/// new photo, then persist. A failed persist discards the new photo; the
/// old photo is only discarded after the record no longer points at it.
pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
    geocoder: Arc<dyn Geocoder>,
    photos: PhotoStore,
}

impl ProfileService {
    pub fn new(
        repo: Arc<dyn ProfileRepository>,
        geocoder: Arc<dyn Geocoder>,
        photos: PhotoStore,
    ) -> Self {
        Self {
            repo,
            geocoder,
            photos,
        }
    }

    pub fn photos(&self) -> &PhotoStore {
        &self.photos
    }

    pub async fn create(&self, new: NewProfile) -> Result<Profile, ProfileError> {
        let photo = new
            .photo
            .ok_or_else(|| ProfileError::Validation("Profile photo is required".into()))?;
        self.photos
            .validate(&photo)
            .map_err(ProfileError::Validation)?;
        let name = required(Some(new.name), "Name is required")?;
        let description = required(Some(new.description), "Description is required")?;
        let postal = new.address.validate()?;

        let coordinates = self.geocoder.lookup(&postal).await?;
        let photo_ref = self.photos.save(&photo).await?;

        let profile = Profile {
            id: uuid::Uuid::now_v7().to_string(),
            name,
            description,
            photo: photo_ref,
            address: postal.locate(coordinates),
            version: 1,
            // stored at microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };

        if let Err(e) = self.repo.insert(&profile).await {
            self.photos.discard(&profile.photo).await;
            return Err(e.into());
        }

        tracing::info!(profile_id = %profile.id, "Created profile");
        Ok(profile)
    }

    pub async fn get(&self, id: &str) -> Result<Profile, ProfileError> {
        self.repo.get(id).await?.ok_or(ProfileError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<Profile>, ProfileError> {
        Ok(self.repo.list().await?)
    }

    pub async fn update(&self, id: &str, changes: ProfileChanges) -> Result<Profile, ProfileError> {
        let current = self.get(id).await?;

        if let Some(photo) = &changes.photo {
            self.photos
                .validate(photo)
                .map_err(ProfileError::Validation)?;
        }
        let postal = changes.address.map(AddressInput::validate).transpose()?;

        let mut updated = current.clone();
        if let Some(postal) = postal {
            let coordinates = self.geocoder.lookup(&postal).await?;
            updated.address = postal.locate(coordinates);
        }

        let new_photo = match &changes.photo {
            Some(photo) => Some(self.photos.save(photo).await?),
            None => None,
        };
        if let Some(reference) = &new_photo {
            updated.photo = reference.clone();
        }
        if let Some(name) = non_blank(changes.name) {
            updated.name = name;
        }
        if let Some(description) = non_blank(changes.description) {
            updated.description = description;
        }
        updated.version = current.version + 1;

        let written = match self.repo.update(&updated, current.version).await {
            Ok(written) => written,
            Err(e) => {
                self.discard_new(&new_photo).await;
                return Err(e.into());
            }
        };

        if !written {
            self.discard_new(&new_photo).await;
            let still_exists = self.repo.get(id).await?.is_some();
            return Err(if still_exists {
                ProfileError::Conflict
            } else {
                ProfileError::NotFound
            });
        }

        if new_photo.is_some() {
            self.photos.discard(&current.photo).await;
        }

        tracing::info!(profile_id = %updated.id, version = updated.version, "Updated profile");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ProfileError> {
        let profile = self.get(id).await?;
        if !self.repo.delete(id).await? {
            return Err(ProfileError::NotFound);
        }
        self.photos.discard(&profile.photo).await;

        tracing::info!(profile_id = %id, "Deleted profile");
        Ok(())
    }

    pub async fn location(&self, id: &str) -> Result<Location, ProfileError> {
        let profile = self.get(id).await?;
        Ok(profile.address.coordinates.into())
    }

    async fn discard_new(&self, new_photo: &Option<String>) {
        if let Some(reference) = new_photo {
            self.photos.discard(reference).await;
        }
    }
}

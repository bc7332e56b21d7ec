pub mod form;
pub mod photos;
pub mod service;

pub use form::{AddressInput, ProfileForm};
pub use photos::{PhotoStore, PhotoUpload};
pub use service::{Location, NewProfile, ProfileChanges, ProfileError, ProfileService};

use axum::extract::Multipart;
use serde::Deserialize;

use crate::db::models::PostalAddress;
use crate::error::{AppError, AppResult};
use crate::profiles::photos::PhotoUpload;
use crate::profiles::service::{NewProfile, ProfileChanges, ProfileError};

/// Address fields as submitted. Every field is optional until validated.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl AddressInput {
    fn set(&mut self, key: &str, value: String) {
        match key {
            "street" => self.street = Some(value),
            "city" => self.city = Some(value),
            "state" => self.state = Some(value),
            "country" => self.country = Some(value),
            // coordinates are always derived, never accepted from clients
            other => tracing::debug!("Ignoring address field {:?}", other),
        }
    }

    pub fn validate(self) -> Result<PostalAddress, ProfileError> {
        Ok(PostalAddress {
            street: required(self.street, "Street address is required")?,
            city: required(self.city, "City is required")?,
            state: non_blank(self.state),
            country: required(self.country, "Country is required")?,
        })
    }
}

/// Multipart body of a create or update request.
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<AddressInput>,
    pub photo: Option<PhotoUpload>,
}

impl ProfileForm {
    /// Reads every part of the body. Address fields may arrive as
    /// `address[street]`, `address.street` or a JSON `address` part.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ProfileForm::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();

            match field_name.as_str() {
                "photo" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.photo = Some(PhotoUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                "name" => form.name = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "address" => {
                    let raw = field.text().await?;
                    let parsed: AddressInput = serde_json::from_str(&raw)
                        .map_err(|e| AppError::BadRequest(format!("Invalid address: {}", e)))?;
                    form.address = Some(parsed);
                }
                other => match address_key(other) {
                    Some(key) => {
                        let key = key.to_string();
                        let value = field.text().await?;
                        form.address.get_or_insert_with(Default::default).set(&key, value);
                    }
                    None => tracing::debug!("Ignoring form field {:?}", other),
                },
            }
        }

        Ok(form)
    }

    pub fn into_new_profile(self) -> NewProfile {
        NewProfile {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            photo: self.photo,
        }
    }

    pub fn into_changes(self) -> ProfileChanges {
        ProfileChanges {
            name: self.name,
            description: self.description,
            address: self.address,
            photo: self.photo,
        }
    }
}

fn address_key(field: &str) -> Option<&str> {
    field
        .strip_prefix("address[")
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| field.strip_prefix("address."))
}

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn required(value: Option<String>, message: &str) -> Result<String, ProfileError> {
    non_blank(value).ok_or_else(|| ProfileError::Validation(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_keys_in_both_notations() {
        assert_eq!(address_key("address[street]"), Some("street"));
        assert_eq!(address_key("address.city"), Some("city"));
        assert_eq!(address_key("address"), None);
        assert_eq!(address_key("name"), None);
    }

    #[test]
    fn coordinates_cannot_be_submitted() {
        let mut input = AddressInput::default();
        input.set("coordinates][lat", "1.0".into());
        assert_eq!(input, AddressInput::default());
    }

    #[test]
    fn validate_requires_street_city_country() {
        let full = AddressInput {
            street: Some(" 1 Infinite Loop ".into()),
            city: Some("Cupertino".into()),
            state: Some("".into()),
            country: Some("USA".into()),
        };
        let postal = full.clone().validate().unwrap();
        assert_eq!(postal.street, "1 Infinite Loop");
        assert_eq!(postal.state, None);

        let no_city = AddressInput {
            city: None,
            ..full.clone()
        };
        assert!(matches!(
            no_city.validate(),
            Err(ProfileError::Validation(m)) if m == "City is required"
        ));

        let blank_country = AddressInput {
            country: Some("  ".into()),
            ..full
        };
        assert!(matches!(
            blank_country.validate(),
            Err(ProfileError::Validation(m)) if m == "Country is required"
        ));
    }

    #[test]
    fn json_address_parses() {
        let parsed: AddressInput =
            serde_json::from_str(r#"{"street":"s","city":"c","country":"x"}"#).unwrap();
        assert_eq!(parsed.state, None);
        assert_eq!(parsed.city.as_deref(), Some("c"));
    }
}

//! Provider domain models.

use serde::{Deserialize, Serialize};

use crate::utils::text::{slugify_code, split_display_name};

/// Relationship between a provider and one clinic location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLink {
    pub clinic_code: String,
    pub location_code: String,
    pub is_primary: bool,
    pub is_active: bool,
}

/// A provider as known to the backing store.
///
/// Records are never mutated by the engine; a refresh replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub id: String,
    /// Stable short key, e.g. `kamdi_irondi`.
    pub code: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub title_prefix: Option<String>,
    pub external_id: Option<String>,
    pub locations: Vec<LocationLink>,
}

impl ProviderRecord {
    /// The link used as the provider's home clinic.
    ///
    /// An active link marked primary wins; otherwise the first active link.
    pub fn primary_location(&self) -> Option<&LocationLink> {
        self.locations
            .iter()
            .find(|link| link.is_primary && link.is_active)
            .or_else(|| self.locations.iter().find(|link| link.is_active))
    }

    pub fn primary_clinic_code(&self) -> Option<String> {
        self.primary_location().map(|link| link.clinic_code.clone())
    }

    /// Number of links flagged primary. More than one is a data problem.
    pub fn primary_link_count(&self) -> usize {
        self.locations.iter().filter(|link| link.is_primary).count()
    }
}

/// Input for explicitly registering a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvider {
    pub code: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub title_prefix: Option<String>,
    pub external_id: Option<String>,
    pub locations: Vec<LocationLink>,
}

impl NewProvider {
    /// Builds a registration from nothing but a display name, as typed by an operator.
    pub fn from_display_name(display_name: &str) -> Self {
        let display_name = display_name.trim().to_string();
        let (first_name, last_name) = split_display_name(&display_name);
        let code = slugify_code(&format!("{} {}", first_name, last_name));
        Self {
            code,
            display_name,
            first_name,
            last_name,
            email: None,
            title_prefix: None,
            external_id: None,
            locations: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.code.trim().is_empty() && !self.display_name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(clinic: &str, primary: bool, active: bool) -> LocationLink {
        LocationLink {
            clinic_code: clinic.to_string(),
            location_code: format!("{}-main", clinic),
            is_primary: primary,
            is_active: active,
        }
    }

    fn provider(locations: Vec<LocationLink>) -> ProviderRecord {
        ProviderRecord {
            id: "p1".to_string(),
            code: "kamdi_irondi".to_string(),
            display_name: "Kamdi Irondi".to_string(),
            first_name: "Kamdi".to_string(),
            last_name: "Irondi".to_string(),
            email: None,
            title_prefix: None,
            external_id: None,
            locations,
        }
    }

    #[test]
    fn test_primary_location_prefers_primary_link() {
        let p = provider(vec![link("BAY", false, true), link("OAK", true, true)]);
        assert_eq!(p.primary_clinic_code().as_deref(), Some("OAK"));
    }

    #[test]
    fn test_primary_location_falls_back_to_first_active() {
        let p = provider(vec![
            link("OLD", false, false),
            link("BAY", false, true),
            link("OAK", false, true),
        ]);
        assert_eq!(p.primary_clinic_code().as_deref(), Some("BAY"));
    }

    #[test]
    fn test_inactive_primary_is_ignored() {
        let p = provider(vec![link("OLD", true, false), link("BAY", false, true)]);
        assert_eq!(p.primary_clinic_code().as_deref(), Some("BAY"));
    }

    #[test]
    fn test_no_active_links() {
        let p = provider(vec![link("OLD", true, false)]);
        assert_eq!(p.primary_clinic_code(), None);
    }

    #[test]
    fn test_new_provider_from_display_name() {
        let new_provider = NewProvider::from_display_name("  Dr. Ada Obi ");
        assert_eq!(new_provider.code, "ada_obi");
        assert_eq!(new_provider.display_name, "Dr. Ada Obi");
        assert_eq!(new_provider.first_name, "Ada");
        assert_eq!(new_provider.last_name, "Obi");
        assert!(new_provider.is_valid());

        assert!(!NewProvider::from_display_name("   ").is_valid());
    }
}

//! Database models for providers.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use prodsync_core::providers::{LocationLink, ProviderRecord};

/// Database model for providers
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::providers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderDB {
    pub id: String,
    pub code: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub title_prefix: Option<String>,
    pub external_id: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Database model for a provider's link to a clinic location
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    Selectable,
    Associations,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::provider_locations)]
#[diesel(belongs_to(ProviderDB, foreign_key = provider_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderLocationDB {
    pub id: String,
    pub provider_id: String,
    pub clinic_code: String,
    pub location_code: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub sort_order: i32,
}

impl ProviderLocationDB {
    pub fn from_link(provider_id: &str, link: LocationLink, sort_order: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            clinic_code: link.clinic_code,
            location_code: link.location_code,
            is_primary: link.is_primary,
            is_active: link.is_active,
            sort_order,
        }
    }
}

impl From<ProviderLocationDB> for LocationLink {
    fn from(db: ProviderLocationDB) -> Self {
        Self {
            clinic_code: db.clinic_code,
            location_code: db.location_code,
            is_primary: db.is_primary,
            is_active: db.is_active,
        }
    }
}

impl ProviderDB {
    /// Combines a provider row with its links, already in `sort_order`.
    pub fn into_record(self, locations: Vec<ProviderLocationDB>) -> ProviderRecord {
        ProviderRecord {
            id: self.id,
            code: self.code,
            display_name: self.display_name,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            title_prefix: self.title_prefix,
            external_id: self.external_id,
            locations: locations.into_iter().map(LocationLink::from).collect(),
        }
    }
}

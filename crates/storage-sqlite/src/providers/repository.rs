use diesel::prelude::*;
use log::{debug, info};
use std::sync::Arc;

use super::model::{ProviderDB, ProviderLocationDB};
use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::{provider_locations, providers};
use prodsync_core::errors::{Error, Result};
use prodsync_core::providers::{NewProvider, ProviderDiscoveryTrait, ProviderRecord};

/// Repository for provider discovery and registration
pub struct ProviderRepository {
    pool: Arc<DbPool>,
}

impl ProviderRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Marks a provider inactive so discovery no longer returns it.
    pub fn deactivate(&self, provider_code: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let updated = diesel::update(providers::table.filter(providers::code.eq(provider_code)))
            .set(providers::is_active.eq(false))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(updated > 0)
    }

    fn upsert(
        conn: &mut SqliteConnection,
        new_provider: NewProvider,
    ) -> std::result::Result<ProviderRecord, StorageError> {
        let existing = providers::table
            .filter(providers::code.eq(&new_provider.code))
            .select(ProviderDB::as_select())
            .first::<ProviderDB>(conn)
            .optional()?;

        let provider = match existing {
            Some(current) => {
                diesel::update(providers::table.find(&current.id))
                    .set((
                        providers::display_name.eq(&new_provider.display_name),
                        providers::first_name.eq(&new_provider.first_name),
                        providers::last_name.eq(&new_provider.last_name),
                        providers::email.eq(&new_provider.email),
                        providers::title_prefix.eq(&new_provider.title_prefix),
                        providers::external_id.eq(&new_provider.external_id),
                        providers::is_active.eq(true),
                    ))
                    .execute(conn)?;
                debug!("Updated provider {}", new_provider.code);
                ProviderDB {
                    id: current.id,
                    code: current.code,
                    display_name: new_provider.display_name,
                    first_name: new_provider.first_name,
                    last_name: new_provider.last_name,
                    email: new_provider.email,
                    title_prefix: new_provider.title_prefix,
                    external_id: new_provider.external_id,
                    is_active: true,
                    created_at: current.created_at,
                }
            }
            None => {
                let provider = ProviderDB {
                    id: uuid::Uuid::new_v4().to_string(),
                    code: new_provider.code,
                    display_name: new_provider.display_name,
                    first_name: new_provider.first_name,
                    last_name: new_provider.last_name,
                    email: new_provider.email,
                    title_prefix: new_provider.title_prefix,
                    external_id: new_provider.external_id,
                    is_active: true,
                    created_at: chrono::Utc::now().naive_utc(),
                };
                diesel::insert_into(providers::table)
                    .values(&provider)
                    .execute(conn)?;
                debug!("Inserted provider {}", provider.code);
                provider
            }
        };

        diesel::delete(
            provider_locations::table.filter(provider_locations::provider_id.eq(&provider.id)),
        )
        .execute(conn)?;

        let links: Vec<ProviderLocationDB> = new_provider
            .locations
            .into_iter()
            .enumerate()
            .map(|(index, link)| {
                ProviderLocationDB::from_link(
                    &provider.id,
                    link,
                    i32::try_from(index).unwrap_or(i32::MAX),
                )
            })
            .collect();
        if !links.is_empty() {
            diesel::insert_into(provider_locations::table)
                .values(&links)
                .execute(conn)?;
        }

        Ok(provider.into_record(links))
    }
}

impl ProviderDiscoveryTrait for ProviderRepository {
    fn discover_providers(&self) -> Result<Vec<ProviderRecord>> {
        let mut conn = get_connection(&self.pool)?;

        let active = providers::table
            .filter(providers::is_active.eq(true))
            .order((providers::created_at.asc(), providers::code.asc()))
            .select(ProviderDB::as_select())
            .load::<ProviderDB>(&mut conn)
            .map_err(StorageError::from)?;

        let links = ProviderLocationDB::belonging_to(&active)
            .order(provider_locations::sort_order.asc())
            .select(ProviderLocationDB::as_select())
            .load::<ProviderLocationDB>(&mut conn)
            .map_err(StorageError::from)?;

        let records: Vec<ProviderRecord> = links
            .grouped_by(&active)
            .into_iter()
            .zip(active)
            .map(|(locations, provider)| provider.into_record(locations))
            .collect();

        debug!("Loaded {} active provider(s)", records.len());
        Ok(records)
    }

    fn register_provider(&self, new_provider: NewProvider) -> Result<ProviderRecord> {
        if !new_provider.is_valid() {
            return Err(Error::InvalidInput(
                "a provider needs a code and a display name".to_string(),
            ));
        }

        let mut pooled = get_connection(&self.pool)?;
        let conn: &mut SqliteConnection = &mut pooled;
        let record =
            conn.transaction::<_, StorageError, _>(|conn| Self::upsert(conn, new_provider))?;
        info!(
            "Stored provider {} with {} location link(s)",
            record.code,
            record.locations.len()
        );
        Ok(record)
    }
}

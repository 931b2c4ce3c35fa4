use diesel::prelude::*;

/// One persisted override, keyed by its dotted settings path.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::app_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppSettingDB {
    pub setting_key: String,
    pub setting_value: String,
}

impl AppSettingDB {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            setting_key: key.trim().to_string(),
            setting_value: value.to_string(),
        }
    }
}

impl From<AppSettingDB> for (String, String) {
    fn from(row: AppSettingDB) -> Self {
        (row.setting_key, row.setting_value)
    }
}

//! Language packs: a read-only SQLite database shared by one or more
//! locale components, each reading its own table.
//!
//! ```json
//! {
//!   "serialType": "ime.extension.languagepack",
//!   "meta": { "id": "org.example.han", "label": "Han", "version": "1.0.0" },
//!   "hanShapeBasedSQLite": "han.sqlite3",
//!   "components": [
//!     { "id": "zh_CN_zhengma", "label": "Chinese (Zhengma)", "authors": [] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::extension::{BindParent, ExtensionComponent, ExtensionVariant, validate_relative_file};
use crate::lifecycle::ExtensionLifecycle;
use crate::locale::LocaleTag;

use super::check_component_ids;

const DEFAULT_DATABASE: &str = "han.sqlite3";
const DEFAULT_KEY_CODES: &str = "abcdefghijklmnopqrstuvwxyz";

fn default_key_codes() -> String {
    DEFAULT_KEY_CODES.to_string()
}

/// One language inside a language pack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagePackComponent {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Locale tag; the component id is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Characters that form shape-based input codes.
    #[serde(default = "default_key_codes")]
    pub han_shape_based_key_code: String,
    /// Table to query; the locale variant is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub han_shape_based_table: Option<String>,
    #[serde(skip)]
    extension_id: String,
}

impl LanguagePackComponent {
    pub fn locale_tag(&self) -> Result<LocaleTag> {
        self.locale.as_deref().unwrap_or(&self.id).parse()
    }

    /// The table this component reads, or `None` if neither an explicit
    /// table nor a locale variant is available.
    pub fn table_name(&self) -> Option<String> {
        match &self.han_shape_based_table {
            Some(table) => Some(table.clone()),
            None => self.locale_tag().ok().and_then(|tag| tag.variant),
        }
    }
}

impl ExtensionComponent for LanguagePackComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn authors(&self) -> &[String] {
        &self.authors
    }

    fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

impl BindParent for LanguagePackComponent {
    fn bind_parent(&mut self, extension_id: &str) {
        self.extension_id = extension_id.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePackExtension {
    /// Database file, relative to the working directory.
    pub han_shape_based_sqlite: String,
    items: Vec<LanguagePackComponent>,
}

impl LanguagePackExtension {
    pub fn components(&self) -> &[LanguagePackComponent] {
        &self.items
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LanguagePackFields {
    #[serde(default, rename = "hanShapeBasedSQLite")]
    han_shape_based_sqlite: Option<String>,
}

impl ExtensionVariant for LanguagePackExtension {
    type Component = LanguagePackComponent;

    fn from_document(
        document: &Map<String, Value>,
        components: Vec<Self::Component>,
    ) -> Result<Self> {
        let fields: LanguagePackFields =
            serde_json::from_value(Value::Object(document.clone()))
                .map_err(|e| Error::malformed("hanShapeBasedSQLite", e))?;
        Ok(Self {
            han_shape_based_sqlite: fields
                .han_shape_based_sqlite
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            items: components,
        })
    }

    fn components(&self) -> &[Self::Component] {
        &self.items
    }

    fn write_fields(&self, document: &mut Map<String, Value>) {
        document.insert(
            "hanShapeBasedSQLite".to_string(),
            Value::String(self.han_shape_based_sqlite.clone()),
        );
    }

    fn validate(&self) -> Result<()> {
        validate_relative_file("hanShapeBasedSQLite", &self.han_shape_based_sqlite)?;
        check_component_ids(self.items.iter().map(|c| c.id.as_str()))?;

        for (index, component) in self.items.iter().enumerate() {
            let locale = component.locale.as_deref().unwrap_or(&component.id);
            locale.parse::<LocaleTag>().map_err(|_| {
                Error::malformed(
                    format!("components[{index}].locale"),
                    format!("'{locale}' is not a locale tag"),
                )
            })?;

            let table = component.table_name().ok_or_else(|| {
                Error::malformed(
                    format!("components[{index}].hanShapeBasedTable"),
                    "no table given and the locale has no variant",
                )
            })?;
            if !is_sql_identifier(&table) {
                return Err(Error::malformed(
                    format!("components[{index}].hanShapeBasedTable"),
                    format!("'{table}' is not a valid table name"),
                ));
            }
            if component.han_shape_based_key_code.is_empty() {
                return Err(Error::malformed(
                    format!("components[{index}].hanShapeBasedKeyCode"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

fn is_sql_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A read-only handle to a loaded language pack's database.
#[derive(Debug)]
pub struct LanguagePackStore {
    connection: Connection,
    path: PathBuf,
    /// Component id → table name.
    tables: BTreeMap<String, String>,
}

impl LanguagePackStore {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table_for(&self, component_id: &str) -> Option<&str> {
        self.tables.get(component_id).map(String::as_str)
    }

    /// Component id and table name pairs, ordered by component id.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables.iter().map(|(id, table)| (id.as_str(), table.as_str()))
    }

    /// Number of rows in the table backing `component_id`, or `None` for an
    /// unknown component.
    pub fn entry_count(&self, component_id: &str) -> Result<Option<u64>> {
        let Some(table) = self.table_for(component_id) else {
            return Ok(None);
        };
        // Table names are validated identifiers, so quoting is enough.
        let count: i64 = self
            .connection
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                row.get(0)
            })
            .map_err(|source| Error::Storage {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(count.max(0) as u64))
    }

    fn close(self) {
        if let Err((_, e)) = self.connection.close() {
            tracing::warn!("Failed to close language pack database {:?}: {}", self.path, e);
        }
    }
}

impl ExtensionLifecycle for LanguagePackExtension {
    type Resources = LanguagePackStore;

    fn after_load(&self, working_dir: &Path) -> Result<LanguagePackStore> {
        let path = working_dir.join(&self.han_shape_based_sqlite);
        if !path.is_file() {
            return Err(Error::Resource {
                path,
                reason: "language pack database not found".to_string(),
            });
        }

        let connection = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| Error::Storage {
            path: path.clone(),
            source,
        })?;

        let mut tables = BTreeMap::new();
        for component in &self.items {
            let Some(table) = component.table_name() else {
                continue;
            };
            let exists: bool = connection
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    [&table],
                    |row| row.get(0),
                )
                .map_err(|source| Error::Storage {
                    path: path.clone(),
                    source,
                })?;
            if !exists {
                return Err(Error::Resource {
                    path,
                    reason: format!(
                        "table '{}' for component '{}' does not exist",
                        table, component.id
                    ),
                });
            }
            tables.insert(component.id.clone(), table);
        }

        tracing::debug!("Opened language pack database {:?} read-only", path);
        Ok(LanguagePackStore {
            connection,
            path,
            tables,
        })
    }

    fn before_unload(&self, resources: LanguagePackStore) {
        resources.close();
    }
}

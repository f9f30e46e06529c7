//! Themes: a set of stylesheet variants (day, night, borderless, ...).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::extension::{BindParent, ExtensionComponent, ExtensionVariant, validate_relative_file};
use crate::lifecycle::ExtensionLifecycle;

use super::{check_component_ids, read_json};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeComponent {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub is_night: bool,
    #[serde(default)]
    pub is_borderless: bool,
    #[serde(default, rename = "isMaterialYouAware")]
    pub is_material_you_aware: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet_path: Option<String>,
    #[serde(skip)]
    extension_id: String,
}

impl ThemeComponent {
    /// Stylesheet location relative to the working directory.
    pub fn stylesheet_path(&self) -> String {
        self.stylesheet_path
            .clone()
            .unwrap_or_else(|| format!("stylesheets/{}.json", self.id))
    }
}

impl ExtensionComponent for ThemeComponent {
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

impl BindParent for ThemeComponent {
    fn bind_parent(&mut self, extension_id: &str) {
        self.extension_id = extension_id.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeExtension {
    themes: Vec<ThemeComponent>,
}

impl ThemeExtension {
    pub fn components(&self) -> &[ThemeComponent] {
        &self.themes
    }

    /// Components usable at night.
    pub fn night_themes(&self) -> impl Iterator<Item = &ThemeComponent> {
        self.themes.iter().filter(|t| t.is_night)
    }
}

impl ExtensionVariant for ThemeExtension {
    type Component = ThemeComponent;

    fn from_document(
        _document: &Map<String, Value>,
        components: Vec<ThemeComponent>,
    ) -> Result<Self> {
        Ok(Self { themes: components })
    }

    fn components(&self) -> &[ThemeComponent] {
        &self.themes
    }

    fn validate(&self) -> Result<()> {
        check_component_ids(self.themes.iter().map(|t| t.id.as_str()))?;
        for (index, theme) in self.themes.iter().enumerate() {
            if let Some(path) = &theme.stylesheet_path {
                validate_relative_file(&format!("components[{index}].stylesheetPath"), path)?;
            }
        }
        Ok(())
    }
}

/// Parsed stylesheets of a loaded theme, keyed by component id.
#[derive(Debug, Default)]
pub struct ThemeStylesheets {
    sheets: BTreeMap<String, Value>,
}

impl ThemeStylesheets {
    pub fn get(&self, component_id: &str) -> Option<&Value> {
        self.sheets.get(component_id)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl ExtensionLifecycle for ThemeExtension {
    type Resources = ThemeStylesheets;

    fn after_load(&self, working_dir: &Path) -> Result<ThemeStylesheets> {
        let mut sheets = BTreeMap::new();
        for theme in &self.themes {
            let path = working_dir.join(theme.stylesheet_path());
            sheets.insert(theme.id.clone(), read_json(&path)?);
        }
        Ok(ThemeStylesheets { sheets })
    }

    fn before_unload(&self, resources: ThemeStylesheets) {
        tracing::trace!("Dropping {} stylesheets", resources.len());
    }
}

//! Keyboard layouts: key arrangements grouped by layout type.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::extension::{BindParent, ExtensionComponent, ExtensionVariant, validate_relative_file};
use crate::lifecycle::ExtensionLifecycle;

use super::{check_component_ids, read_json};

/// Which keyboard a layout replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutType {
    Characters,
    CharactersMod,
    Extension,
    Numeric,
    NumericAdvanced,
    NumericRow,
    Phone,
    Phone2,
    Symbols,
    SymbolsMod,
    Symbols2,
    Symbols2Mod,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::CharactersMod => "charactersMod",
            Self::Extension => "extension",
            Self::Numeric => "numeric",
            Self::NumericAdvanced => "numericAdvanced",
            Self::NumericRow => "numericRow",
            Self::Phone => "phone",
            Self::Phone2 => "phone2",
            Self::Symbols => "symbols",
            Self::SymbolsMod => "symbolsMod",
            Self::Symbols2 => "symbols2",
            Self::Symbols2Mod => "symbols2Mod",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    #[default]
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutComponent {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub layout_type: LayoutType,
    #[serde(default)]
    pub direction: LayoutDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrangement_file: Option<String>,
    #[serde(skip)]
    extension_id: String,
}

impl LayoutComponent {
    pub fn arrangement_file(&self) -> String {
        self.arrangement_file
            .clone()
            .unwrap_or_else(|| format!("layouts/{}/{}.json", self.layout_type, self.id))
    }
}

impl ExtensionComponent for LayoutComponent {
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

impl BindParent for LayoutComponent {
    fn bind_parent(&mut self, extension_id: &str) {
        self.extension_id = extension_id.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutExtension {
    layouts: Vec<LayoutComponent>,
}

impl LayoutExtension {
    pub fn components(&self) -> &[LayoutComponent] {
        &self.layouts
    }

    pub fn layouts_of_type(
        &self,
        layout_type: LayoutType,
    ) -> impl Iterator<Item = &LayoutComponent> {
        self.layouts.iter().filter(move |l| l.layout_type == layout_type)
    }
}

impl ExtensionVariant for LayoutExtension {
    type Component = LayoutComponent;

    fn from_document(
        _document: &Map<String, Value>,
        components: Vec<LayoutComponent>,
    ) -> Result<Self> {
        Ok(Self { layouts: components })
    }

    fn components(&self) -> &[LayoutComponent] {
        &self.layouts
    }

    fn validate(&self) -> Result<()> {
        check_component_ids(self.layouts.iter().map(|l| l.id.as_str()))?;
        for (index, layout) in self.layouts.iter().enumerate() {
            if let Some(path) = &layout.arrangement_file {
                validate_relative_file(&format!("components[{index}].arrangementFile"), path)?;
            }
        }
        Ok(())
    }
}

/// Parsed key arrangements of a loaded layout, keyed by component id.
#[derive(Debug, Default)]
pub struct LayoutArrangements {
    arrangements: BTreeMap<String, Value>,
}

impl LayoutArrangements {
    pub fn get(&self, component_id: &str) -> Option<&Value> {
        self.arrangements.get(component_id)
    }

    pub fn len(&self) -> usize {
        self.arrangements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrangements.is_empty()
    }
}

impl ExtensionLifecycle for LayoutExtension {
    type Resources = LayoutArrangements;

    fn after_load(&self, working_dir: &Path) -> Result<LayoutArrangements> {
        let mut arrangements = BTreeMap::new();
        for layout in &self.layouts {
            let path = working_dir.join(layout.arrangement_file());
            arrangements.insert(layout.id.clone(), read_json(&path)?);
        }
        Ok(LayoutArrangements { arrangements })
    }

    fn before_unload(&self, resources: LayoutArrangements) {
        tracing::trace!("Dropping {} arrangements", resources.len());
    }
}

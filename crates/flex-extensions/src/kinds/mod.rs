//! The extension kinds and the resources each one opens on load.

mod language_pack;
mod layout;
mod theme;

pub use language_pack::{LanguagePackComponent, LanguagePackExtension, LanguagePackStore};
pub use layout::{LayoutArrangements, LayoutComponent, LayoutDirection, LayoutExtension, LayoutType};
pub use theme::{ThemeComponent, ThemeExtension, ThemeStylesheets};

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::extension::validate_id;

/// Component ids must be valid ids and unique within one extension.
pub(crate) fn check_component_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, id) in ids.enumerate() {
        let field = format!("components[{index}].id");
        validate_id(id).map_err(|reason| Error::malformed(&field, reason))?;
        if !seen.insert(id) {
            return Err(Error::malformed(field, format!("duplicate component id '{id}'")));
        }
    }
    Ok(())
}

/// Read a JSON resource referenced by a component.
pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::Resource {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| Error::Resource {
        path: path.to_path_buf(),
        reason: format!("invalid JSON: {e}"),
    })
}

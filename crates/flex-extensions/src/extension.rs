//! The extension model: metadata, the closed set of extension kinds, and
//! the components they carry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::kinds::{LanguagePackExtension, LayoutExtension, ThemeExtension};

/// Basic metadata about an extension. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtensionMeta {
    /// Globally unique identifier (e.g. `org.example.languagepack.han`).
    pub id: String,
    /// Human-readable name.
    pub label: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub version: semver::Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_tracker: Option<String>,
    /// Ids of extensions that must be loaded before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// The serial-type tag carried by a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialType {
    LanguagePack,
    Theme,
    Layout,
}

impl SerialType {
    pub const ALL: [SerialType; 3] = [Self::LanguagePack, Self::Theme, Self::Layout];

    /// The tag string as it appears in `extension.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguagePack => "ime.extension.languagepack",
            Self::Theme => "ime.extension.theme",
            Self::Layout => "ime.extension.keyboard",
        }
    }
}

impl FromStr for SerialType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| Error::UnsupportedExtensionType {
                tag: tag.to_string(),
            })
    }
}

impl fmt::Display for SerialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One kind of extension, with its kind-specific fields and components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionKind {
    LanguagePack(LanguagePackExtension),
    Theme(ThemeExtension),
    Layout(LayoutExtension),
}

impl ExtensionKind {
    pub fn serial_type(&self) -> SerialType {
        match self {
            Self::LanguagePack(_) => SerialType::LanguagePack,
            Self::Theme(_) => SerialType::Theme,
            Self::Layout(_) => SerialType::Layout,
        }
    }

    /// Components in manifest order, behind the common component interface.
    pub fn components(&self) -> Vec<&dyn ExtensionComponent> {
        match self {
            Self::LanguagePack(ext) => as_dyn(ext.components()),
            Self::Theme(ext) => as_dyn(ext.components()),
            Self::Layout(ext) => as_dyn(ext.components()),
        }
    }
}

fn as_dyn<C: ExtensionComponent>(components: &[C]) -> Vec<&dyn ExtensionComponent> {
    components
        .iter()
        .map(|c| c as &dyn ExtensionComponent)
        .collect()
}

/// An installable package of components plus metadata.
///
/// A freshly parsed extension has neither an archive path nor a working
/// directory; the manager fills both in when it installs the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub meta: ExtensionMeta,
    pub kind: ExtensionKind,
    /// The host-provided archive; never owned or modified.
    pub archive_path: Option<PathBuf>,
    /// The extracted tree under the cache root.
    pub working_dir: Option<PathBuf>,
}

impl Extension {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn serial_type(&self) -> SerialType {
        self.kind.serial_type()
    }

    pub fn components(&self) -> Vec<&dyn ExtensionComponent> {
        self.kind.components()
    }

    /// Look up a component by its id.
    pub fn component(&self, id: &str) -> Option<&dyn ExtensionComponent> {
        self.components().into_iter().find(|c| c.id() == id)
    }

    /// Resolve a path relative to the working directory, if staged.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        self.working_dir.as_deref().map(|dir| dir.join(relative))
    }
}

/// One loadable unit inside an extension.
///
/// A component refers back to its parent by id only; lookups of the parent
/// go through the registry.
pub trait ExtensionComponent: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn authors(&self) -> &[String];
    /// Id of the extension this component belongs to.
    fn extension_id(&self) -> &str;

    fn name(&self) -> ComponentName {
        ComponentName::new(self.extension_id(), self.id())
    }
}

/// Hook used by the codec to record the parent id on each component.
pub(crate) trait BindParent {
    fn bind_parent(&mut self, extension_id: &str);
}

/// Shared codec surface of the extension kinds.
///
/// The codec decodes the component list element by element (so errors can
/// name `components[i]`) and hands the rest of the document to
/// [`from_document`](ExtensionVariant::from_document) for kind-level fields.
pub(crate) trait ExtensionVariant: Sized {
    type Component: ExtensionComponent + BindParent + Serialize + DeserializeOwned;

    fn from_document(document: &Map<String, Value>, components: Vec<Self::Component>)
    -> Result<Self>;

    fn components(&self) -> &[Self::Component];

    /// Write kind-level fields (everything except meta and components).
    fn write_fields(&self, _document: &mut Map<String, Value>) {}

    /// Kind-specific validation after decoding.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Address of a component across the registry: `<extension id>/<component id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentName {
    pub extension_id: String,
    pub component_id: String,
}

impl ComponentName {
    pub fn new(extension_id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            component_id: component_id.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.extension_id, self.component_id)
    }
}

impl FromStr for ComponentName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((ext, comp)) if !ext.is_empty() && !comp.is_empty() && !comp.contains('/') => {
                Ok(Self::new(ext, comp))
            }
            _ => Err(Error::malformed(
                "componentName",
                format!("expected '<extension id>/<component id>', got '{s}'"),
            )),
        }
    }
}

/// Extension and component ids double as file and directory names, so they
/// are limited to ASCII alphanumerics, `.`, `-` and `_`, with no leading `.`.
pub(crate) fn validate_id(id: &str) -> std::result::Result<(), String> {
    if id.is_empty() {
        return Err("must not be empty".to_string());
    }
    if id.starts_with('.') {
        return Err(format!("'{id}' must not start with '.'"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
    {
        return Err(format!("'{id}' contains invalid character {c:?}"));
    }
    Ok(())
}

/// Check a relative file reference from a manifest: no root, no `..`.
pub(crate) fn validate_relative_file(field: &str, value: &str) -> Result<()> {
    let path = Path::new(value);
    if value.is_empty() {
        return Err(Error::malformed(field, "must not be empty"));
    }
    if path.has_root() || value.starts_with('\\') {
        return Err(Error::malformed(field, "must be a relative path"));
    }
    if path
        .components()
        .any(|c| c == std::path::Component::ParentDir)
    {
        return Err(Error::malformed(field, "must not contain '..'"));
    }
    Ok(())
}

//! Manifest codec for `extension.json`.
//!
//! Every package archive carries its manifest at the fixed path
//! [`MANIFEST_FILENAME`]. The `serialType` tag selects the extension kind,
//! and with it the shape of each component and of the kind-level fields.
//!
//! # Example
//!
//! ```json
//! {
//!   "serialType": "ime.extension.theme",
//!   "meta": {
//!     "id": "org.example.themes.dark",
//!     "label": "Dark themes",
//!     "authors": ["Jane Doe <jane@example.com>"],
//!     "version": "1.2.0",
//!     "license": "apache-2.0",
//!     "dependencies": []
//!   },
//!   "components": [
//!     { "id": "night", "label": "Night", "authors": [], "isNight": true }
//!   ]
//! }
//! ```
//!
//! Decoding errors name the offending field with a dotted path
//! (`meta.version`, `components[2].label`), so hosts can point users at
//! the exact problem.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::extension::{
    BindParent, Extension, ExtensionKind, ExtensionMeta, ExtensionVariant, SerialType, validate_id,
};
use crate::kinds::{LanguagePackExtension, LayoutExtension, ThemeExtension};

/// Fixed location of the manifest inside an archive.
pub const MANIFEST_FILENAME: &str = "extension.json";

/// Parse a manifest document into an [`Extension`] without paths.
///
/// # Errors
///
/// - [`Error::MalformedManifest`] naming the first missing or invalid field
/// - [`Error::UnsupportedExtensionType`] if `serialType` is unknown
pub fn parse(bytes: &[u8]) -> Result<Extension> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::malformed("$", e))?;
    let Value::Object(mut document) = document else {
        return Err(Error::malformed("$", "manifest must be a JSON object"));
    };

    let tag = match document.remove("serialType") {
        Some(Value::String(tag)) => tag,
        Some(_) => return Err(Error::malformed("serialType", "must be a string")),
        None => return Err(Error::malformed("serialType", "missing required field")),
    };
    let serial_type: SerialType = tag.parse()?;

    let meta = match document.remove("meta") {
        Some(value) => parse_meta(value)?,
        None => return Err(Error::malformed("meta", "missing required field")),
    };

    let components = match document.remove("components") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(Error::malformed("components", "must be an array")),
        None => Vec::new(),
    };

    let kind = match serial_type {
        SerialType::LanguagePack => {
            let pack = decode::<LanguagePackExtension>(&meta.id, &document, components)?;
            ExtensionKind::LanguagePack(pack)
        }
        SerialType::Theme => {
            ExtensionKind::Theme(decode::<ThemeExtension>(&meta.id, &document, components)?)
        }
        SerialType::Layout => {
            ExtensionKind::Layout(decode::<LayoutExtension>(&meta.id, &document, components)?)
        }
    };

    tracing::trace!("Parsed {} manifest for {}", serial_type, meta.id);
    Ok(Extension {
        meta,
        kind,
        archive_path: None,
        working_dir: None,
    })
}

/// Serialize an extension back into a pretty-printed manifest.
///
/// Paths are runtime state and are not written.
pub fn serialize(extension: &Extension) -> Result<Vec<u8>> {
    let mut document = Map::new();
    document.insert(
        "serialType".to_string(),
        Value::String(extension.serial_type().as_str().to_string()),
    );
    document.insert("meta".to_string(), to_value(&extension.meta)?);

    match &extension.kind {
        ExtensionKind::LanguagePack(ext) => encode(ext, &mut document)?,
        ExtensionKind::Theme(ext) => encode(ext, &mut document)?,
        ExtensionKind::Layout(ext) => encode(ext, &mut document)?,
    }

    serde_json::to_vec_pretty(&Value::Object(document))
        .map_err(|e| Error::ManifestSerialize(e.to_string()))
}

/// Read and parse the manifest of a staged or claimed tree.
pub fn read_manifest(dir: &Path) -> Result<Extension> {
    let path = dir.join(MANIFEST_FILENAME);
    if !path.is_file() {
        return Err(Error::ManifestNotFound(path));
    }
    let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
    parse(&bytes)
}

fn parse_meta(value: Value) -> Result<ExtensionMeta> {
    let Value::Object(fields) = &value else {
        return Err(Error::malformed("meta", "must be an object"));
    };
    for field in ["id", "label", "version"] {
        match fields.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => return Err(Error::malformed(format!("meta.{field}"), "must be a string")),
            None => {
                return Err(Error::malformed(format!("meta.{field}"), "missing required field"));
            }
        }
    }
    if let Some(Value::String(version)) = fields.get("version") {
        semver::Version::parse(version).map_err(|e| {
            Error::malformed("meta.version", format!("'{version}' is not a semantic version: {e}"))
        })?;
    }

    let meta: ExtensionMeta =
        serde_json::from_value(value).map_err(|e| Error::malformed("meta", e))?;
    validate_meta(&meta)?;
    Ok(meta)
}

fn validate_meta(meta: &ExtensionMeta) -> Result<()> {
    validate_id(&meta.id).map_err(|reason| Error::malformed("meta.id", reason))?;
    if meta.label.trim().is_empty() {
        return Err(Error::malformed("meta.label", "must not be empty"));
    }

    for (index, dependency) in meta.dependencies.iter().enumerate() {
        let field = format!("meta.dependencies[{index}]");
        validate_id(dependency).map_err(|reason| Error::malformed(&field, reason))?;
        if *dependency == meta.id {
            return Err(Error::malformed(field, "an extension cannot depend on itself"));
        }
        if meta.dependencies[..index].contains(dependency) {
            return Err(Error::malformed(
                field,
                format!("duplicate dependency '{dependency}'"),
            ));
        }
    }
    Ok(())
}

fn decode<V: ExtensionVariant>(
    extension_id: &str,
    document: &Map<String, Value>,
    items: Vec<Value>,
) -> Result<V> {
    let mut components = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = &item else {
            return Err(Error::malformed(format!("components[{index}]"), "must be an object"));
        };
        for field in ["id", "label"] {
            match fields.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(Error::malformed(
                        format!("components[{index}].{field}"),
                        "must be a string",
                    ));
                }
                None => {
                    return Err(Error::malformed(
                        format!("components[{index}].{field}"),
                        "missing required field",
                    ));
                }
            }
        }

        let mut component: V::Component = serde_json::from_value(item)
            .map_err(|e| Error::malformed(format!("components[{index}]"), e))?;
        component.bind_parent(extension_id);
        components.push(component);
    }

    let variant = V::from_document(document, components)?;
    variant.validate()?;
    Ok(variant)
}

fn encode<V: ExtensionVariant>(variant: &V, document: &mut Map<String, Value>) -> Result<()> {
    variant.write_fields(document);
    let components = variant
        .components()
        .iter()
        .map(to_value)
        .collect::<Result<Vec<_>>>()?;
    document.insert("components".to_string(), Value::Array(components));
    Ok(())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::ManifestSerialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flex_test_utils::manifest as fixtures;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn bytes(document: &Value) -> Vec<u8> {
        serde_json::to_vec(document).unwrap()
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::MalformedManifest { field, .. } => field,
            other => panic!("expected MalformedManifest, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_theme() {
        let ext = parse(&bytes(&fixtures::theme("org.example.dark", &[]))).unwrap();
        assert_eq!(ext.id(), "org.example.dark");
        assert_eq!(ext.serial_type(), SerialType::Theme);
        assert_eq!(ext.meta.version, semver::Version::new(1, 0, 0));
        assert_eq!(ext.archive_path, None);
        assert_eq!(ext.working_dir, None);

        let ids: Vec<_> = ext.components().iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["day", "night"]);
        assert!(
            ext.components()
                .iter()
                .all(|c| c.extension_id() == "org.example.dark")
        );
    }

    #[test]
    fn test_parse_language_pack() {
        let document = fixtures::language_pack("org.example.han", &["org.example.base"]);
        let ext = parse(&bytes(&document)).unwrap();
        let ExtensionKind::LanguagePack(pack) = &ext.kind else {
            panic!("expected a language pack, got {:?}", ext.kind);
        };
        assert_eq!(pack.han_shape_based_sqlite, "han.sqlite3");
        assert_eq!(pack.components()[0].table_name().as_deref(), Some("zhengma"));
        assert_eq!(ext.meta.dependencies, vec!["org.example.base"]);
    }

    #[test]
    fn test_language_pack_database_defaults() {
        let mut document = fixtures::language_pack("org.example.han", &[]);
        document.as_object_mut().unwrap().remove("hanShapeBasedSQLite");

        let ext = parse(&bytes(&document)).unwrap();
        let ExtensionKind::LanguagePack(pack) = &ext.kind else {
            panic!("expected a language pack");
        };
        assert_eq!(pack.han_shape_based_sqlite, "han.sqlite3");
    }

    #[test]
    fn test_parse_layout() {
        let ext = parse(&bytes(&fixtures::layout("org.example.qwerty", &[]))).unwrap();
        assert_eq!(ext.serial_type(), SerialType::Layout);
        assert_eq!(ext.component("qwerty").unwrap().label(), "QWERTY");
    }

    #[test]
    fn test_missing_components_is_empty() {
        let mut document = fixtures::theme("org.example.empty", &[]);
        document.as_object_mut().unwrap().remove("components");
        let ext = parse(&bytes(&document)).unwrap();
        assert!(ext.components().is_empty());
    }

    #[rstest]
    #[case::serial_type(&["serialType"], "serialType")]
    #[case::meta(&["meta"], "meta")]
    #[case::meta_id(&["meta", "id"], "meta.id")]
    #[case::meta_label(&["meta", "label"], "meta.label")]
    #[case::meta_version(&["meta", "version"], "meta.version")]
    fn test_missing_required_field(#[case] path: &[&str], #[case] expected: &str) {
        let mut document = fixtures::theme("org.example.dark", &[]);
        let mut target = &mut document;
        for key in &path[..path.len() - 1] {
            target = target.get_mut(*key).unwrap();
        }
        target.as_object_mut().unwrap().remove(path[path.len() - 1]);

        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), expected);
    }

    #[rstest]
    #[case::id("id")]
    #[case::label("label")]
    fn test_missing_component_field(#[case] field: &str) {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["components"][1].as_object_mut().unwrap().remove(field);

        assert_eq!(
            field_of(parse(&bytes(&document)).unwrap_err()),
            format!("components[1].{field}")
        );
    }

    #[test]
    fn test_unknown_serial_type() {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["serialType"] = json!("ime.extension.spelling");

        let err = parse(&bytes(&document)).unwrap_err();
        assert!(
            matches!(
                err,
                Error::UnsupportedExtensionType { ref tag } if tag == "ime.extension.spelling"
            ),
            "got: {err:?}"
        );
    }

    #[test]
    fn test_unknown_meta_field_is_rejected() {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["meta"]["maintainer"] = json!("someone");
        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), "meta");
    }

    #[rstest]
    #[case("1.0")]
    #[case("v1.0.0")]
    #[case("latest")]
    fn test_invalid_version(#[case] version: &str) {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["meta"]["version"] = json!(version);
        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), "meta.version");
    }

    #[rstest]
    #[case("")]
    #[case(".hidden")]
    #[case("org/example")]
    #[case("org example")]
    #[case("..")]
    fn test_invalid_id(#[case] id: &str) {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["meta"]["id"] = json!(id);
        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), "meta.id");
    }

    #[rstest]
    #[case("../x")]
    #[case("../../../secret")]
    #[case("nested/day")]
    #[case("..\\windows")]
    #[case(".hidden")]
    #[case("")]
    fn test_component_id_must_be_a_plain_name(#[case] id: &str) {
        let mut document = fixtures::theme("org.example.dark", &[]);
        document["components"][0]["id"] = json!(id);
        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), "components[0].id");
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let document = fixtures::theme("org.example.dark", &["org.example.dark"]);
        assert_eq!(
            field_of(parse(&bytes(&document)).unwrap_err()),
            "meta.dependencies[0]"
        );
    }

    #[test]
    fn test_duplicate_dependency_is_rejected() {
        let document =
            fixtures::theme("org.example.dark", &["org.example.base", "org.example.base"]);
        assert_eq!(
            field_of(parse(&bytes(&document)).unwrap_err()),
            "meta.dependencies[1]"
        );
    }

    #[test]
    fn test_not_json() {
        assert_eq!(field_of(parse(b"serialType = 'toml'").unwrap_err()), "$");
        assert_eq!(field_of(parse(b"[]").unwrap_err()), "$");
    }

    #[test]
    fn test_component_wrong_shape() {
        let mut document = fixtures::layout("org.example.qwerty", &[]);
        document["components"][0]["layoutType"] = json!("emoji");
        assert_eq!(field_of(parse(&bytes(&document)).unwrap_err()), "components[0]");
    }

    #[test]
    fn test_serialize_round_trip_preserves_everything() {
        for document in [
            fixtures::theme("org.example.dark", &["org.example.base"]),
            fixtures::language_pack("org.example.han", &[]),
            fixtures::layout("org.example.qwerty", &["org.example.han"]),
        ] {
            let ext = parse(&bytes(&document)).unwrap();
            let written = serialize(&ext).unwrap();
            assert_eq!(parse(&written).unwrap(), ext);
        }
    }

    #[test]
    fn test_serialize_writes_serial_type_first() {
        let ext = parse(&bytes(&fixtures::theme("org.example.dark", &[]))).unwrap();
        let written = String::from_utf8(serialize(&ext).unwrap()).unwrap();
        let serial = written.find("\"serialType\"").unwrap();
        let meta = written.find("\"meta\"").unwrap();
        assert!(serial < meta, "{written}");
    }

    #[test]
    fn test_read_manifest_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound(_)), "got: {err:?}");
    }

    #[test]
    fn test_read_manifest_from_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILENAME),
            bytes(&fixtures::layout("org.example.qwerty", &[])),
        )
        .unwrap();
        assert_eq!(read_manifest(dir.path()).unwrap().id(), "org.example.qwerty");
    }
}

//! Sample `extension.json` documents and matching archives.
//!
//! Every `*_archive` helper returns an [`ArchiveBuilder`] whose auxiliary
//! files satisfy the kind's after-load hook, so loading it succeeds. The
//! `broken_*` variants leave out a referenced file so loading fails.

use rusqlite::Connection;
use serde_json::{Value, json};

use crate::ArchiveBuilder;

pub const LANGUAGE_PACK_TYPE: &str = "ime.extension.languagepack";
pub const THEME_TYPE: &str = "ime.extension.theme";
pub const KEYBOARD_TYPE: &str = "ime.extension.keyboard";

/// A `meta` block with one author and version `1.0.0`.
pub fn meta(id: &str, dependencies: &[&str]) -> Value {
    json!({
        "id": id,
        "label": format!("{id} label"),
        "authors": ["Jane Doe <jane@example.com>"],
        "version": "1.0.0",
        "license": "apache-2.0",
        "dependencies": dependencies,
    })
}

/// Theme manifest with a `day` and a `night` variant.
pub fn theme(id: &str, dependencies: &[&str]) -> Value {
    json!({
        "serialType": THEME_TYPE,
        "meta": meta(id, dependencies),
        "components": [
            { "id": "day", "label": "Day", "authors": [] },
            { "id": "night", "label": "Night", "authors": [], "isNight": true },
        ],
    })
}

/// Theme archive with both stylesheets present.
pub fn theme_archive(id: &str, dependencies: &[&str]) -> ArchiveBuilder {
    ArchiveBuilder::new()
        .manifest(&theme(id, dependencies))
        .file("stylesheets/day.json", r##"{ "keyboard": { "background": "#eeeeee" } }"##)
        .file("stylesheets/night.json", r##"{ "keyboard": { "background": "#212121" } }"##)
}

/// Theme archive whose stylesheets are missing.
pub fn broken_theme_archive(id: &str, dependencies: &[&str]) -> ArchiveBuilder {
    ArchiveBuilder::new().manifest(&theme(id, dependencies))
}

/// Language pack manifest with a single `zh_CN_zhengma` component.
///
/// The component's table defaults to the locale variant, `zhengma`.
pub fn language_pack(id: &str, dependencies: &[&str]) -> Value {
    json!({
        "serialType": LANGUAGE_PACK_TYPE,
        "meta": meta(id, dependencies),
        "hanShapeBasedSQLite": "han.sqlite3",
        "components": [
            { "id": "zh_CN_zhengma", "label": "Chinese (Zhengma)", "authors": [] },
        ],
    })
}

/// Language pack archive with a database holding the `zhengma` table.
pub fn language_pack_archive(id: &str, dependencies: &[&str]) -> ArchiveBuilder {
    ArchiveBuilder::new()
        .manifest(&language_pack(id, dependencies))
        .file("han.sqlite3", han_database(&["zhengma"]))
}

/// Language pack archive without its database file.
pub fn broken_language_pack_archive(id: &str, dependencies: &[&str]) -> ArchiveBuilder {
    ArchiveBuilder::new().manifest(&language_pack(id, dependencies))
}

/// Keyboard layout manifest with a single `qwerty` character layout.
pub fn layout(id: &str, dependencies: &[&str]) -> Value {
    json!({
        "serialType": KEYBOARD_TYPE,
        "meta": meta(id, dependencies),
        "components": [
            { "id": "qwerty", "label": "QWERTY", "authors": [], "layoutType": "characters" },
        ],
    })
}

/// Layout archive with its arrangement file present.
pub fn layout_archive(id: &str, dependencies: &[&str]) -> ArchiveBuilder {
    ArchiveBuilder::new()
        .manifest(&layout(id, dependencies))
        .file(
            "layouts/characters/qwerty.json",
            r#"[[{ "code": 113, "label": "q" }, { "code": 119, "label": "w" }]]"#,
        )
}

/// Build an SQLite database file with one `(code, word, weight)` table per
/// name and return its bytes.
pub fn han_database(tables: &[&str]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("han.sqlite3");
    {
        let conn = Connection::open(&path).unwrap();
        for table in tables {
            conn.execute_batch(&format!(
                "CREATE TABLE {table} (code TEXT NOT NULL, word TEXT NOT NULL, weight INTEGER);\n\
                 INSERT INTO {table} (code, word, weight) VALUES ('a', '工', 1);"
            ))
            .unwrap();
        }
    }
    std::fs::read(&path).unwrap()
}

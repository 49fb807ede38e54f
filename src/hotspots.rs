//! Persistent hotspot map.
//!
//! Each output directory carries a `cursor-hotspots.json` recording the
//! aligned hotspot per cursor and resolution, so installers and theme
//! packagers can consume the rendered bitmaps without re-deriving them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

pub const FILE_NAME: &str = "cursor-hotspots.json";

/// The hotspot map of one output directory.
///
/// Loaded on creation, mutated by the pipeline as cursors render, written
/// back once at finalization with an atomic rename.
pub struct HotspotStore {
    path: PathBuf,
    entries: BTreeMap<String, BTreeMap<u32, (u32, u32)>>,
    dirty: bool,
}

impl HotspotStore {
    pub fn load(directory: &Path) -> io::Result<HotspotStore> {
        let path = directory.join(FILE_NAME);

        let entries = match fs::read_to_string(&path) {
            Ok(text) => match parse(&text) {
                Some(entries) => entries,
                None => {
                    warn!("{}: unreadable hotspot store, starting over", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        Ok(HotspotStore {
            path,
            entries,
            dirty: false,
        })
    }

    /// Records a hotspot.  (0, 0) hotspots are the default and are not
    /// recorded.
    pub fn set(&mut self, cursor: &str, resolution: u32, hotspot: (u32, u32)) {
        if hotspot == (0, 0) {
            return;
        }

        self.entries
            .entry(cursor.to_string())
            .or_default()
            .insert(resolution, hotspot);
        self.dirty = true;
    }

    /// Looks up a hotspot; the cursor name is matched case-insensitively.
    pub fn get(&self, cursor: &str, resolution: u32) -> Option<(u32, u32)> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(cursor))
            .and_then(|(_, sizes)| sizes.get(&resolution).copied())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the store if anything changed: temp file first, then rename.
    pub fn save(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let mut root = Map::new();
        for (cursor, sizes) in &self.entries {
            let mut by_size = Map::new();
            // Resolutions high to low.
            for (resolution, (x, y)) in sizes.iter().rev() {
                by_size.insert(resolution.to_string(), Value::String(format!("{x} {y}")));
            }
            root.insert(cursor.clone(), Value::Object(by_size));
        }

        let text = serde_json::to_string_pretty(&Value::Object(root))
            .expect("hotspot maps always serialize");

        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, text.as_bytes())?;
        fs::rename(&temp, &self.path)?;

        self.dirty = false;
        Ok(())
    }
}

fn parse(text: &str) -> Option<BTreeMap<String, BTreeMap<u32, (u32, u32)>>> {
    let root: Map<String, Value> = serde_json::from_str(text).ok()?;

    let mut entries = BTreeMap::new();
    for (cursor, sizes) in root {
        let sizes = sizes.as_object()?;
        let mut by_size = BTreeMap::new();

        for (resolution, hotspot) in sizes {
            let resolution: u32 = resolution.parse().ok()?;
            let mut parts = hotspot.as_str()?.split_ascii_whitespace();
            let x: u32 = parts.next()?.parse().ok()?;
            let y: u32 = parts.next()?.parse().ok()?;
            by_size.insert(resolution, (x, y));
        }

        entries.insert(cursor, by_size);
    }

    Some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_looks_up_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HotspotStore::load(dir.path()).unwrap();

        store.set("Left_Ptr", 32, (3, 5));
        store.set("Left_Ptr", 64, (6, 10));

        assert_eq!(store.get("left_ptr", 32), Some((3, 5)));
        assert_eq!(store.get("LEFT_PTR", 64), Some((6, 10)));
        assert_eq!(store.get("left_ptr", 48), None);
        assert_eq!(store.get("other", 32), None);
    }

    #[test]
    fn suppresses_default_hotspots() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HotspotStore::load(dir.path()).unwrap();

        store.set("default", 32, (0, 0));
        assert!(store.is_empty());
        store.save().unwrap();
        assert!(!dir.path().join(FILE_NAME).exists());
    }

    #[test]
    fn persists_with_resolutions_high_to_low() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = HotspotStore::load(dir.path()).unwrap();
        store.set("wait", 32, (4, 4));
        store.set("wait", 128, (16, 16));
        store.set("wait", 64, (8, 8));
        store.save().unwrap();

        let text = fs::read_to_string(dir.path().join(FILE_NAME)).unwrap();
        let at_128 = text.find("\"128\"").unwrap();
        let at_64 = text.find("\"64\"").unwrap();
        let at_32 = text.find("\"32\"").unwrap();
        assert!(at_128 < at_64 && at_64 < at_32, "{text}");
        assert!(text.contains("\"16 16\""));

        // And it loads back.
        let reloaded = HotspotStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.get("wait", 64), Some((8, 8)));

        // No stray temp file.
        assert!(!dir.path().join("cursor-hotspots.json.tmp").exists());
    }

    #[test]
    fn corrupt_store_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), b"{ not json").unwrap();

        let store = HotspotStore::load(dir.path()).unwrap();
        assert!(store.is_empty());
    }
}

//! Filesystem layout discovery
//!
//! Layouts are directories under the layouts root, each holding a
//! `Rainmeter.ini` that names its skins as sections. A skin section whose
//! `Active` key is `1` is part of the layout; its `.ini` files live under the
//! skins root at the path spelled by the section name (`illustro\Clock`).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::LayoutDiscovery;
use super::ini::IniDocument;
use crate::common::constants::engine;
use crate::config::ConfigStore;

/// Reads layouts and skins from the roots configured in the store
///
/// Roots are read on every call, so path changes made through the store
/// take effect without rebuilding the discovery.
pub struct FsLayoutDiscovery {
    store: Arc<ConfigStore>,
}

impl FsLayoutDiscovery {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    fn roots(&self) -> (PathBuf, PathBuf) {
        let config = self.store.get();
        (
            config.layouts_root_path.clone(),
            config.skins_root_path.clone(),
        )
    }
}

impl LayoutDiscovery for FsLayoutDiscovery {
    fn list_layouts(&self) -> Vec<String> {
        let (layouts_root, _) = self.roots();
        let entries = match fs::read_dir(&layouts_root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = ?layouts_root, error = %e, "Failed to read layouts directory");
                }
                return Vec::new();
            }
        };

        let mut layouts: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        layouts.sort();
        layouts
    }

    fn resolve_skins(&self, layout: &str) -> BTreeMap<String, Vec<PathBuf>> {
        let (layouts_root, skins_root) = self.roots();
        let layout_file = layouts_root.join(layout).join(engine::LAYOUT_FILE);

        let document = match IniDocument::read(&layout_file) {
            Ok(document) => document,
            Err(e) => {
                debug!(layout = %layout, error = %e, "Layout file not readable");
                return BTreeMap::new();
            }
        };

        // The layout records where the engine kept its skins when it was saved.
        // That path is often from another machine, so only trust it if present.
        let skin_root = document
            .section(engine::ENGINE_SECTION)
            .and_then(|section| section.get(engine::SKIN_PATH_KEY))
            .map(PathBuf::from)
            .filter(|path| path.is_dir())
            .unwrap_or(skins_root);

        let mut skins = BTreeMap::new();
        for section in document.sections() {
            if section.name.eq_ignore_ascii_case(engine::ENGINE_SECTION) {
                continue;
            }
            if section.get(engine::ACTIVE_KEY) != Some(engine::ACTIVE_VALUE) {
                continue;
            }
            let skin_dir = skin_directory(&skin_root, &section.name);
            skins.insert(section.name.clone(), list_skin_files(&skin_dir));
        }

        debug!(layout = %layout, skins = skins.len(), "Resolved active skins");
        skins
    }

    fn read_variables(&self, file: &Path, filter_includes: bool) -> BTreeMap<String, String> {
        let document = match IniDocument::read(file) {
            Ok(document) => document,
            Err(e) => {
                debug!(file = ?file, error = %e, "Skin file not readable");
                return BTreeMap::new();
            }
        };
        let Some(section) = document.section(engine::VARIABLES_SECTION) else {
            return BTreeMap::new();
        };

        let mut variables = BTreeMap::new();
        for (key, value) in section.entries() {
            if filter_includes && starts_with_ignore_case(key, engine::INCLUDE_PREFIX) {
                continue;
            }
            variables
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        variables
    }
}

/// Skin names use backslash separators regardless of platform
fn skin_directory(skin_root: &Path, skin_name: &str) -> PathBuf {
    skin_name
        .split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .fold(skin_root.to_path_buf(), |path, part| path.join(part))
}

/// Every `.ini` under `dir`, recursively, sorted by path
fn list_skin_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(engine::SKIN_FILE_EXTENSION))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        layouts: PathBuf,
        skins: PathBuf,
        discovery: FsLayoutDiscovery,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layouts = dir.path().join("Layouts");
        let skins = dir.path().join("Skins");
        fs::create_dir_all(&layouts).unwrap();
        fs::create_dir_all(&skins).unwrap();

        let store = Arc::new(ConfigStore::load(dir.path().join("settings.json")));
        store
            .set_paths(Some(layouts.clone()), Some(skins.clone()))
            .unwrap();

        Fixture {
            _dir: dir,
            layouts,
            skins,
            discovery: FsLayoutDiscovery::new(store),
        }
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_list_layouts_sorted_directories_only() {
        let fx = fixture();
        fs::create_dir_all(fx.layouts.join("Work")).unwrap();
        fs::create_dir_all(fx.layouts.join("Home")).unwrap();
        write(&fx.layouts.join("stray.txt"), "");

        assert_eq!(fx.discovery.list_layouts(), vec!["Home", "Work"]);
    }

    #[test]
    fn test_list_layouts_missing_root_is_empty() {
        let fx = fixture();
        fs::remove_dir_all(&fx.layouts).unwrap();
        assert!(fx.discovery.list_layouts().is_empty());
    }

    #[test]
    fn test_resolve_skins_only_active_sections() {
        let fx = fixture();
        write(
            &fx.layouts.join("Work").join("Rainmeter.ini"),
            "[Rainmeter]\nSkinPath=C:\\Nowhere\\Skins\\\n\n\
             [illustro\\Clock]\nActive=1\n\n\
             [illustro\\Disk]\nActive=0\n\n\
             [Weather]\nActive=1\n",
        );
        write(&fx.skins.join("illustro/Clock/Clock.ini"), "[Variables]\n");
        write(&fx.skins.join("illustro/Clock/alt/Big.ini"), "[Variables]\n");
        write(&fx.skins.join("illustro/Clock/readme.txt"), "");
        write(&fx.skins.join("illustro/Disk/Disk.ini"), "[Variables]\n");

        let skins = fx.discovery.resolve_skins("Work");

        let names: Vec<&str> = skins.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Weather", "illustro\\Clock"]);
        assert_eq!(
            skins["illustro\\Clock"],
            vec![
                fx.skins.join("illustro/Clock/Clock.ini"),
                fx.skins.join("illustro/Clock/alt/Big.ini"),
            ]
        );
        // Active skin without a directory on disk
        assert!(skins["Weather"].is_empty());
    }

    #[test]
    fn test_resolve_skins_uses_existing_skin_path() {
        let fx = fixture();
        let elsewhere = fx._dir.path().join("OtherSkins");
        write(&elsewhere.join("Clock/Clock.ini"), "[Variables]\n");
        write(
            &fx.layouts.join("Work").join("Rainmeter.ini"),
            &format!(
                "[Rainmeter]\nSkinPath={}\n[Clock]\nActive=1\n",
                elsewhere.display()
            ),
        );

        let skins = fx.discovery.resolve_skins("Work");
        assert_eq!(skins["Clock"], vec![elsewhere.join("Clock/Clock.ini")]);
    }

    #[test]
    fn test_resolve_skins_missing_layout_is_empty() {
        let fx = fixture();
        assert!(fx.discovery.resolve_skins("Nope").is_empty());
    }

    #[test]
    fn test_read_variables_filters_includes() {
        let fx = fixture();
        let file = fx.skins.join("Clock/Clock.ini");
        write(
            &file,
            "[Rainmeter]\nUpdate=1000\n\n[Variables]\n@Include=#@#Vars.inc\n\
             @INCLUDE2=other.inc\nFontSize=12\nColor=255,255,255\nFontSize=99\n",
        );

        let filtered = fx.discovery.read_variables(&file, true);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered["FontSize"], "12");
        assert_eq!(filtered["Color"], "255,255,255");

        let unfiltered = fx.discovery.read_variables(&file, false);
        assert_eq!(unfiltered.len(), 4);
        assert_eq!(unfiltered["@Include"], "#@#Vars.inc");
    }

    #[test]
    fn test_read_variables_missing_file_or_section() {
        let fx = fixture();
        assert!(
            fx.discovery
                .read_variables(&fx.skins.join("missing.ini"), true)
                .is_empty()
        );

        let file = fx.skins.join("NoVars.ini");
        write(&file, "[Meter]\nText=hi\n");
        assert!(fx.discovery.read_variables(&file, true).is_empty());
    }

    #[test]
    fn test_skin_directory_splits_backslashes() {
        let root = Path::new("/skins");
        assert_eq!(
            skin_directory(root, "illustro\\Clock"),
            PathBuf::from("/skins/illustro/Clock")
        );
    }
}

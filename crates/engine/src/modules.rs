//! Where script modules come from.
//!
//! Assets are addressed by slash-separated names relative to a module root,
//! e.g. `tng/core.lua` for the module `tng.core` and
//! `tng/core.apispec.lua` for its API specification. Sources are read-only
//! and shared by every interpreter in the pool.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix that marks an API specification asset.
pub const API_SPEC_SUFFIX: &str = ".apispec.lua";

pub trait ModuleSource: Send + Sync {
    /// Every asset name this source can supply.
    fn asset_names(&self) -> Vec<String>;

    /// Read one asset. `Ok(None)` means this source does not have it.
    fn read_asset(&self, name: &str) -> io::Result<Option<String>>;
}

/// Asset name for a `require` module name.
pub fn module_asset_name(module: &str) -> String {
    format!("{}.lua", module.replace('.', "/"))
}

pub fn is_api_spec(asset: &str) -> bool {
    asset.ends_with(API_SPEC_SUFFIX)
}

// ============================================================================
// Bundled modules
// ============================================================================

const BUNDLED: &[(&str, &str)] = &[
    ("tng/core.lua", include_str!("../lua/tng/core.lua")),
    ("tng/graph.lua", include_str!("../lua/tng/graph.lua")),
    ("tng/graphext.lua", include_str!("../lua/tng/graphext.lua")),
    ("tng/core.apispec.lua", include_str!("../lua/tng/core.apispec.lua")),
    ("tng/graph.apispec.lua", include_str!("../lua/tng/graph.apispec.lua")),
    ("tng/graphext.apispec.lua", include_str!("../lua/tng/graphext.apispec.lua")),
];

/// The `tng.*` API modules compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledModules;

impl ModuleSource for BundledModules {
    fn asset_names(&self) -> Vec<String> {
        BUNDLED.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn read_asset(&self, name: &str) -> io::Result<Option<String>> {
        Ok(BUNDLED
            .iter()
            .find(|(asset, _)| *asset == name)
            .map(|(_, source)| source.to_string()))
    }
}

// ============================================================================
// In-memory modules
// ============================================================================

/// Assets held in memory. Useful for hosts that ship modules in a database
/// and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryModules {
    assets: Vec<(String, String)>,
}

impl MemoryModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        self.assets.retain(|(existing, _)| *existing != name);
        self.assets.push((name, source.into()));
        self
    }
}

impl ModuleSource for MemoryModules {
    fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_asset(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self
            .assets
            .iter()
            .find(|(asset, _)| asset == name)
            .map(|(_, source)| source.clone()))
    }
}

// ============================================================================
// Directory modules
// ============================================================================

/// Per-install modules under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryModules {
    root: PathBuf,
}

impl DirectoryModules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("cannot list module dir {}: {}", dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let name = if prefix.is_empty() {
                file_name
            } else {
                format!("{prefix}/{file_name}")
            };
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, &name, out);
            } else if name.ends_with(".lua") {
                out.push(name);
            }
        }
    }
}

impl ModuleSource for DirectoryModules {
    fn asset_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect(&self.root, "", &mut names);
        names.sort();
        names
    }

    fn read_asset(&self, name: &str) -> io::Result<Option<String>> {
        // Asset names never climb out of the root
        if name.split('/').any(|part| part == ".." || part.is_empty()) {
            return Ok(None);
        }
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Layering
// ============================================================================

/// Several sources searched in order; the first that has an asset wins.
#[derive(Clone, Default)]
pub struct LayeredModules {
    layers: Vec<Arc<dyn ModuleSource>>,
}

impl LayeredModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, layer: Arc<dyn ModuleSource>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl ModuleSource for LayeredModules {
    fn asset_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .layers
            .iter()
            .flat_map(|layer| layer.asset_names())
            .collect();
        names.into_iter().collect()
    }

    fn read_asset(&self, name: &str) -> io::Result<Option<String>> {
        for layer in &self.layers {
            if let Some(source) = layer.read_asset(name)? {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_names_map_to_paths() {
        assert_eq!(module_asset_name("tng.core"), "tng/core.lua");
        assert_eq!(module_asset_name("util"), "util.lua");
    }

    #[test]
    fn bundled_modules_have_api_specs() {
        let names = BundledModules.asset_names();
        assert_eq!(names.iter().filter(|n| is_api_spec(n)).count(), 3);
        assert!(BundledModules.read_asset("tng/graph.lua").unwrap().is_some());
        assert!(BundledModules.read_asset("tng/missing.lua").unwrap().is_none());
    }

    #[test]
    fn directory_modules_walk_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("acme")).unwrap();
        fs::write(dir.path().join("acme/stats.lua"), "return {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let modules = DirectoryModules::new(dir.path());
        assert_eq!(modules.asset_names(), vec!["acme/stats.lua".to_string()]);
        assert_eq!(modules.read_asset("acme/stats.lua").unwrap().as_deref(), Some("return {}"));
        assert!(modules.read_asset("../etc/passwd").unwrap().is_none());
    }

    #[test]
    fn first_layer_shadows_later_ones() {
        let top = MemoryModules::new().with_asset("tng/core.lua", "return 'override'");
        let layered = LayeredModules::new()
            .push(Arc::new(top))
            .push(Arc::new(BundledModules));

        let source = layered.read_asset("tng/core.lua").unwrap().unwrap();
        assert_eq!(source, "return 'override'");
        assert!(layered.read_asset("tng/graph.lua").unwrap().is_some());
        let names = layered.asset_names();
        assert_eq!(names.iter().filter(|n| *n == "tng/core.lua").count(), 1);
    }
}

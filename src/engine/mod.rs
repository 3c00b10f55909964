//! Layout engine integration
//!
//! Two seams face the external engine: [`LayoutDiscovery`] reads what layouts
//! and skins exist on disk, [`CommandDispatch`] tells the running engine what
//! to do. Both are traits so the switcher can be driven by fakes in tests.

pub mod discovery;
pub mod dispatch;
pub mod ini;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use discovery::FsLayoutDiscovery;
pub use dispatch::ProcessDispatcher;

pub trait LayoutDiscovery: Send + Sync {
    /// Layout names available under the layouts root, sorted
    fn list_layouts(&self) -> Vec<String>;

    /// Active skins of `layout` mapped to their `.ini` files
    ///
    /// Unknown layouts resolve to an empty map.
    fn resolve_skins(&self, layout: &str) -> BTreeMap<String, Vec<PathBuf>>;

    /// The `[Variables]` section of a skin file, empty if unreadable
    fn read_variables(&self, file: &Path, filter_includes: bool) -> BTreeMap<String, String>;
}

pub trait CommandDispatch: Send + Sync {
    fn load_layout(&self, layout: &str) -> Result<()>;

    fn write_key_value(&self, file: &Path, section: &str, key: &str, value: &str) -> Result<()>;

    fn refresh_skin(&self, skin: &str) -> Result<()>;
}

//! Documentation-asset catalog

use bytes::Bytes;
use std::collections::BTreeMap;

/// Named documentation documents served from the documentation surface.
/// Populated at startup, read-only afterwards; ordered by name so the
/// listing is stable.
#[derive(Default)]
pub struct AssetCatalog {
    assets: BTreeMap<String, Bytes>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self {
            assets: BTreeMap::new(),
        }
    }

    pub fn insert(mut self, name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.assets.insert(name.into(), content.into());
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.assets.keys().map(|name| name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.assets.get(name).cloned()
    }
}

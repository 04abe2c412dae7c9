//! Page-template resolution for notebooks.
//!
//! Every notebook page names a background template ("Blank", "P Lines
//! small", "Dots S", ...) in its `.pagedata` sibling. The device keeps
//! the rendered PNGs under a fixed directory; we fetch each one at most
//! once per session and park it in a scratch directory whose lifetime is
//! tied to the cache.

use crate::error::Result;
use crate::transport::Transport;
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;

const TEMPLATE_DIR: &str = "/usr/share/remarkable/templates";

/// The page-template name that means "no template".
pub const BLANK: &str = "Blank";

pub struct TemplateCache {
    dir: tempfile::TempDir,
    // None records a failed fetch so we do not retry it every page.
    cache: HashMap<String, Option<PathBuf>>,
}

impl TemplateCache {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            cache: HashMap::new(),
        })
    }

    /// Resolve a template name to a local PNG path. `Blank` bypasses the
    /// cache entirely; a template the device cannot produce resolves to
    /// `None` and the page renders untemplated.
    pub fn lookup(&mut self, transport: &mut dyn Transport, name: &str) -> Option<PathBuf> {
        if name == BLANK || name.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.get(name) {
            return cached.clone();
        }

        let fetched = self.fetch(transport, name);
        if fetched.is_none() {
            warn!("template {:?} could not be fetched", name);
        }
        self.cache.insert(name.to_string(), fetched.clone());
        fetched
    }

    fn fetch(&self, transport: &mut dyn Transport, name: &str) -> Option<PathBuf> {
        let remote = format!("{}/{}.png", TEMPLATE_DIR, name);
        let data = transport.read_all(&remote).ok()?;
        let local = self.dir.path().join(format!("{}.png", name));
        std::fs::write(&local, data).ok()?;
        Some(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::InMemoryTransport;

    #[test]
    fn blank_never_touches_the_transport() {
        let mut cache = TemplateCache::new().unwrap();
        let mut transport = InMemoryTransport::new();
        assert_eq!(cache.lookup(&mut transport, BLANK), None);
        assert_eq!(cache.lookup(&mut transport, ""), None);
    }

    #[test]
    fn fetched_once_then_cached() {
        let mut cache = TemplateCache::new().unwrap();
        let mut transport = InMemoryTransport::new();
        transport.seed(
            "/usr/share/remarkable/templates/Dots S.png",
            b"\x89PNG fake".to_vec(),
        );

        let first = cache.lookup(&mut transport, "Dots S").unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"\x89PNG fake");
        let second = cache.lookup(&mut transport, "Dots S").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_template_resolves_to_none() {
        let mut cache = TemplateCache::new().unwrap();
        let mut transport = InMemoryTransport::new();
        assert_eq!(cache.lookup(&mut transport, "No Such"), None);
        // The miss is cached too.
        assert_eq!(cache.lookup(&mut transport, "No Such"), None);
    }
}

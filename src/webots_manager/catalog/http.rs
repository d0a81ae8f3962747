use super::{ArchiveCatalog, ArchiveIndex, ArchiveNaming};
use crate::error::Result;
use crate::version::Version;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#)
        .expect("href pattern is a valid regex")
});

/// Catalog backed by an HTML directory listing, e.g.
/// `https://www.cyberbotics.com/archive/linux`.
pub struct HttpCatalog {
    base_url: String,
    naming: ArchiveNaming,
    index: OnceCell<ArchiveIndex>,
}

impl HttpCatalog {
    pub fn new(base_url: &str, arch: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            naming: ArchiveNaming::new(arch)?,
            index: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index(&self) -> Result<&ArchiveIndex> {
        self.index.get_or_try_init(|| {
            tracing::info!("fetching release listing from {}", self.base_url);
            let body = reqwest::blocking::get(&self.base_url)?
                .error_for_status()?
                .text()?;
            parse_listing(&body, &self.naming)
        })
    }
}

/// Collects every linked archive in an HTML listing. A link that looks like
/// an archive for this architecture but carries a malformed version fails the
/// whole listing.
pub fn parse_listing(html: &str, naming: &ArchiveNaming) -> Result<ArchiveIndex> {
    let mut index = ArchiveIndex::default();
    for caps in HREF.captures_iter(html) {
        let href = &caps[1];
        let name = href.rsplit('/').next().unwrap_or(href);
        if let Some(v) = naming.parse_file_name(name)? {
            index.insert(v, name.to_string());
        }
    }
    Ok(index)
}

impl ArchiveCatalog for HttpCatalog {
    fn available_versions(&self) -> Result<Vec<Version>> {
        Ok(self.index()?.versions())
    }

    fn resolve_download(&self, v: Version) -> Result<String> {
        let name = self.index()?.file_name(v)?;
        Ok(format!("{}/{}", self.base_url, name))
    }
}

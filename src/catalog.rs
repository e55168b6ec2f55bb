//! Fixed feed catalog.
//!
//! The catalog is built once at startup and never changes. Subscriptions only
//! store locators; display names are recovered through a reverse index.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::CatalogEntry;

/// Built-in catalog used when the config file declares no `[[catalog]]` entries.
pub const DEFAULT_SOURCES: &[(&str, &str)] = &[
    ("ダイヤモンド社", "https://diamond.jp/feed/"),
    (
        "日経BP社",
        "https://www.nikkeibp.co.jp/article/news/20081006/102677/",
    ),
    (
        "日経TRENDY",
        "https://trendy.nikkeibp.co.jp/tools/rss/index.html",
    ),
    ("朝日新聞社", "https://www.asahi.com/information/service/rss.html"),
    ("NHKニュース", "https://www3.nhk.or.jp/toppage/rss/index.html"),
    ("NHKオンライン", "https://www3.nhk.or.jp/toppage/rss/index2.html"),
    ("経済レポート", "https://www3.keizaireport.com/category.php/rss/"),
    ("中部経済新聞", "https://www.chukei-news.co.jp/index.xml"),
    (
        "日経ビジネス",
        "https://business.nikkeibp.co.jp/rss/all_nbo.rdf",
    ),
    ("ECO JAPAN（nikkei）", "https://eco.nikkeibp.co.jp/rss/eco/eco.rdf"),
    (
        "ケンプラッツ",
        "https://kenplatz.nikkeibp.co.jp/article/knp/20071204/513934/",
    ),
    ("読売新聞社", "https://www.yomiuri.co.jp/tools/rss/"),
];

/// A feed source from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FeedSource {
    /// Display name.
    pub name: String,
    /// Fetchable feed address.
    pub locator: String,
}

impl FeedSource {
    /// Create a new source.
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

/// Immutable catalog of feed sources with name and locator indexes.
#[derive(Debug, Clone)]
pub struct Catalog {
    sources: Vec<FeedSource>,
    by_locator: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from sources, keeping their order.
    ///
    /// Later duplicates of a name or locator are ignored; `Config::validate`
    /// rejects them before this point.
    pub fn new(sources: impl IntoIterator<Item = FeedSource>) -> Self {
        let mut catalog = Self {
            sources: Vec::new(),
            by_locator: HashMap::new(),
            by_name: HashMap::new(),
        };
        for source in sources {
            if catalog.by_locator.contains_key(&source.locator)
                || catalog.by_name.contains_key(&source.name)
            {
                continue;
            }
            let idx = catalog.sources.len();
            catalog.by_locator.insert(source.locator.clone(), idx);
            catalog.by_name.insert(source.name.clone(), idx);
            catalog.sources.push(source);
        }
        catalog
    }

    /// Build a catalog from config entries.
    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|e| FeedSource::new(e.name.clone(), e.url.clone())),
        )
    }

    /// The built-in catalog.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_SOURCES
                .iter()
                .map(|(name, url)| FeedSource::new(*name, *url)),
        )
    }

    /// All sources in catalog order.
    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the catalog has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Whether the locator belongs to the catalog.
    pub fn contains(&self, locator: &str) -> bool {
        self.by_locator.contains_key(locator)
    }

    /// Look up a source by locator.
    pub fn get(&self, locator: &str) -> Option<&FeedSource> {
        self.by_locator.get(locator).map(|&idx| &self.sources[idx])
    }

    /// Display name for a locator, if it is in the catalog.
    pub fn lookup_name(&self, locator: &str) -> Option<&str> {
        self.get(locator).map(|s| s.name.as_str())
    }

    /// Source for a stored locator. Locators that left the catalog keep
    /// their raw address as display name.
    pub fn source_for(&self, locator: &str) -> FeedSource {
        self.get(locator)
            .cloned()
            .unwrap_or_else(|| FeedSource::new(locator, locator))
    }

    /// Resolve user input that is either a display name or a locator.
    pub fn resolve(&self, key: &str) -> Option<&FeedSource> {
        let key = key.trim();
        self.get(key)
            .or_else(|| self.by_name.get(key).map(|&idx| &self.sources[idx]))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

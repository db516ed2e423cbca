//! Source configuration and registration-time validation.
//!
//! Every site is described by a [`SourceConfig`] value: URL templates,
//! selectors, pagination and page-decoding strategies, date and status
//! tables. Nothing about a site is code. A config is checked once by
//! [`SourceConfig::compile`], which also compiles every selector into a
//! [`SelectorArena`] keyed by field name so that no selector string is parsed
//! again while serving requests.
//!
//! Configs are usually loaded from a TOML catalog:
//!
//! ```rust
//! use hondana::config::{PaginationStrategy, SourceConfig};
//!
//! let config: SourceConfig = toml::from_str(r#"
//!     id = "example"
//!     name = "Example Scans"
//!     base_url = "https://example.com"
//!     pagination = "selector"
//!
//!     [urls]
//!     popular = "/manga/page/{page}/?m_orderby=views"
//!
//!     [selectors]
//!     popular_item = "div.page-item-detail"
//!     title = "h3 a"
//!     url = { selector = "h3 a", attrs = ["href"] }
//!     next_page = "a.nextpostslink"
//!     chapter_item = "li.wp-manga-chapter"
//!     page_item = "div.page-break img"
//! "#).unwrap();
//!
//! assert_eq!(config.pagination, PaginationStrategy::Selector);
//! let compiled = config.compile().unwrap();
//! assert_eq!(compiled.base().as_str(), "https://example.com/");
//! ```

use chrono::{DateTime, Datelike, Utc, Weekday};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::date::DateConfig;
use crate::error::{Error, Result};
use crate::filter::{FilterDescriptor, FilterLocation};
use crate::markup::{Field, Query};
use crate::types::{Collection, ListingKind, MangaStatus};

/// Upper bound for [`SourceConfig::max_retries`].
pub const MAX_RETRIES_CAP: u32 = 5;

/// User agent sent under [`UserAgentPolicy::Fixed`].
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Placeholders every URL template may use.
pub const URL_PLACEHOLDERS: [&str; 13] = [
    "page",
    "offset",
    "cursor",
    "query",
    "collection",
    "manga_url",
    "manga_slug",
    "chapter_url",
    "chapter_slug",
    "lang",
    "weekday",
    "weekday_short",
    "page_size",
];

/// Placeholders allowed inside selector expressions.
pub const SELECTOR_PLACEHOLDERS: [&str; 3] = ["weekday", "weekday_short", "lang"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}\s]+)\}").expect("valid regex"));

/// Markup format served by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    #[default]
    Html,
    Json,
}

/// Token bucket parameters: `permits` requests per `period_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    #[serde(default = "default_permits")]
    pub permits: u32,
    #[serde(default = "default_period")]
    pub period_seconds: u64,
}

fn default_permits() -> u32 {
    2
}

fn default_period() -> u64 {
    1
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            permits: default_permits(),
            period_seconds: default_period(),
        }
    }
}

impl RateLimit {
    pub fn new(permits: u32, period_seconds: u64) -> Self {
        Self {
            permits,
            period_seconds,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

/// How the `User-Agent` header is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgentPolicy {
    /// Always [`DEFAULT_USER_AGENT`]
    #[default]
    Fixed,
    /// A fresh desktop browser string for every request
    Random,
    /// A site-specific string
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
}

/// URL templates, relative to the base URL or absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplates {
    #[serde(default)]
    pub popular: String,
    pub latest: Option<String>,
    pub search: Option<String>,

    /// Collection listing, usually containing `{collection}`
    pub collection: Option<String>,

    /// Alternate chapter endpoint, e.g. `{manga_url}ajax/chapters/`
    pub chapter_list: Option<String>,
    #[serde(default)]
    pub chapter_list_method: HttpMethod,

    /// Form body sent with a `post` chapter list request
    pub chapter_list_body: Option<String>,

    /// Page limit when the chapter list template paginates with `{page}`
    #[serde(default = "default_chapter_pages")]
    pub chapter_list_max_pages: u32,

    /// Items per page, used for `{offset}` and `{page_size}`
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_chapter_pages() -> u32 {
    20
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            popular: String::new(),
            latest: None,
            search: None,
            collection: None,
            chapter_list: None,
            chapter_list_method: HttpMethod::Get,
            chapter_list_body: None,
            chapter_list_max_pages: default_chapter_pages(),
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

/// How one field is read: a selector locating a node, then either the first
/// non-empty attribute out of `attrs` or, when `attrs` is empty, its text.
///
/// An empty selector designates the current node itself. In TOML a field is
/// either a plain selector string or a `{ selector, attrs }` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "FieldSpecRepr", into = "FieldSpecRepr")]
pub struct FieldSpec {
    pub selector: String,
    pub attrs: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FieldSpecRepr {
    Short(String),
    Full {
        #[serde(default)]
        selector: String,
        #[serde(default)]
        attrs: Vec<String>,
    },
}

impl From<FieldSpecRepr> for FieldSpec {
    fn from(repr: FieldSpecRepr) -> Self {
        match repr {
            FieldSpecRepr::Short(selector) => FieldSpec::text(selector),
            FieldSpecRepr::Full { selector, attrs } => FieldSpec { selector, attrs },
        }
    }
}

impl From<FieldSpec> for FieldSpecRepr {
    fn from(spec: FieldSpec) -> Self {
        if spec.attrs.is_empty() {
            FieldSpecRepr::Short(spec.selector)
        } else {
            FieldSpecRepr::Full {
                selector: spec.selector,
                attrs: spec.attrs,
            }
        }
    }
}

impl FieldSpec {
    /// Text content of the first node matching `selector`.
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attrs: Vec::new(),
        }
    }

    /// Attribute `attr` of the first node matching `selector`.
    pub fn attr(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attrs: vec![attr.into()],
        }
    }

    /// Adds a fallback attribute, tried when the previous ones are empty.
    pub fn or_attr(mut self, attr: impl Into<String>) -> Self {
        self.attrs.push(attr.into());
        self
    }
}

impl From<&str> for FieldSpec {
    fn from(selector: &str) -> Self {
        FieldSpec::text(selector)
    }
}

/// Selector set of a source.
///
/// Item selectors are evaluated against the whole document, field selectors
/// against one item node. For JSON sources every selector is a dot path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    pub popular_item: Option<String>,
    pub latest_item: Option<String>,
    pub search_item: Option<String>,
    pub collection_item: Option<String>,

    pub title: Option<FieldSpec>,
    pub url: Option<FieldSpec>,
    pub thumbnail: Option<FieldSpec>,

    pub next_page: Option<String>,
    pub load_more: Option<String>,
    pub next_cursor: Option<FieldSpec>,

    pub detail_title: Option<FieldSpec>,
    pub author: Option<FieldSpec>,
    pub artist: Option<FieldSpec>,
    pub genre: Option<FieldSpec>,
    pub description: Option<FieldSpec>,
    pub status: Option<FieldSpec>,

    pub chapter_item: Option<String>,
    #[serde(default = "default_chapter_url")]
    pub chapter_url: FieldSpec,
    #[serde(default = "default_chapter_name")]
    pub chapter_name: FieldSpec,
    pub chapter_date: Option<FieldSpec>,
    pub chapter_scanlator: Option<FieldSpec>,

    pub page_item: Option<String>,
}

fn default_chapter_url() -> FieldSpec {
    FieldSpec::attr("a", "href")
}

fn default_chapter_name() -> FieldSpec {
    FieldSpec::text("a")
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            popular_item: None,
            latest_item: None,
            search_item: None,
            collection_item: None,
            title: None,
            url: None,
            thumbnail: None,
            next_page: None,
            load_more: None,
            next_cursor: None,
            detail_title: None,
            author: None,
            artist: None,
            genre: None,
            description: None,
            status: None,
            chapter_item: None,
            chapter_url: default_chapter_url(),
            chapter_name: default_chapter_name(),
            chapter_date: None,
            chapter_scanlator: None,
            page_item: None,
        }
    }
}

/// Has-next-page policy of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Single page; markup is ignored
    #[default]
    Never,
    /// Another page exists as long as this one had items
    Always,
    /// The `next_page` selector matched
    Selector,
    /// The `load_more` button selector matched
    LoadMore,
}

impl FromStr for PaginationStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "never" | "none" => Ok(PaginationStrategy::Never),
            "always" => Ok(PaginationStrategy::Always),
            "selector" => Ok(PaginationStrategy::Selector),
            "load_more" | "loadmore" => Ok(PaginationStrategy::LoadMore),
            other => Err(Error::parse(format!("unknown pagination strategy `{other}`"))),
        }
    }
}

/// Ordering applied to an extracted chapter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterOrder {
    /// Keep the order the site shows
    #[default]
    Site,
    NumberAscending,
    NumberDescending,
}

/// How page nodes turn into image URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageStrategy {
    /// First non-empty attribute out of `attrs`
    Attribute {
        #[serde(default = "default_page_attrs")]
        attrs: Vec<String>,
    },
    /// Base64-encoded URL stored in `attr`
    Base64 { attr: String },
    /// URL in `attr` with `{width}` and `{height}` placeholders
    Template {
        attr: String,
        #[serde(default = "default_width")]
        width: u32,
        #[serde(default = "default_height")]
        height: u32,
    },
    /// Page list loaded from a JSON manifest whose URL is found in the
    /// chapter document, either in `attr` or through `pattern`'s first capture.
    Manifest {
        attr: Option<String>,
        pattern: Option<String>,
        /// Dot path to the page array; empty for a top-level array
        #[serde(default)]
        path: String,
        /// Key holding the URL when entries are objects
        url_field: Option<String>,
    },
}

fn default_page_attrs() -> Vec<String> {
    ["data-src", "data-lazy-src", "data-cfsrc", "src"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_width() -> u32 {
    1200
}

fn default_height() -> u32 {
    1800
}

impl Default for PageStrategy {
    fn default() -> Self {
        PageStrategy::Attribute {
            attrs: default_page_attrs(),
        }
    }
}

/// One entry of the status table: text containing `pattern` maps to `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    pub pattern: String,
    pub status: MangaStatus,
}

impl StatusRule {
    pub fn new(pattern: impl Into<String>, status: MangaStatus) -> Self {
        Self {
            pattern: pattern.into(),
            status,
        }
    }
}

/// Built-in status table (English, French, Spanish, Portuguese).
pub fn default_status_map() -> Vec<StatusRule> {
    let hiatus = ["hiatus", "on hold", "paused", "en pause", "pausado", "em pausa"];
    let completed = [
        "completed", "complete", "finished", "terminé", "termine", "finalizado", "completo",
        "concluído", "concluido",
    ];
    let ongoing = [
        "ongoing", "en cours", "en curso", "publishing", "releasing", "updating",
        "em andamento", "emisión", "emision", "em lançamento",
    ];

    hiatus
        .into_iter()
        .map(|p| StatusRule::new(p, MangaStatus::Hiatus))
        .chain(completed.into_iter().map(|p| StatusRule::new(p, MangaStatus::Completed)))
        .chain(ongoing.into_iter().map(|p| StatusRule::new(p, MangaStatus::Ongoing)))
        .collect()
}

/// Side-channel "count this view" request fired when pages are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCounter {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
}

/// Immutable configuration of one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default)]
    pub format: DocumentFormat,
    #[serde(default)]
    pub date: DateConfig,

    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default)]
    pub user_agent: UserAgentPolicy,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub urls: UrlTemplates,
    #[serde(default)]
    pub selectors: Selectors,

    #[serde(default)]
    pub pagination: PaginationStrategy,
    #[serde(default)]
    pub use_alternate_chapter_endpoint: bool,
    #[serde(default)]
    pub chapter_order: ChapterOrder,
    #[serde(default)]
    pub page_strategy: PageStrategy,
    #[serde(default = "default_status_map")]
    pub status_map: Vec<StatusRule>,

    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
    #[serde(default)]
    pub view_counter: Option<ViewCounter>,

    /// Scanlator reported for chapters without a scanlator selector match
    #[serde(default)]
    pub scanlator: Option<String>,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            base_url: String::new(),
            lang: default_lang(),
            format: DocumentFormat::default(),
            date: DateConfig::default(),
            rate_limit: RateLimit::default(),
            user_agent: UserAgentPolicy::default(),
            headers: BTreeMap::new(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout(),
            urls: UrlTemplates::default(),
            selectors: Selectors::default(),
            pagination: PaginationStrategy::default(),
            use_alternate_chapter_endpoint: false,
            chapter_order: ChapterOrder::default(),
            page_strategy: PageStrategy::default(),
            status_map: default_status_map(),
            collections: Vec::new(),
            filters: Vec::new(),
            view_counter: None,
            scanlator: None,
        }
    }
}

impl SourceConfig {
    /// Creates a config with defaults for everything but identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Maps free status text to the closed status enum.
    ///
    /// Rules are tried in order against the lowercased text; the first rule
    /// whose pattern occurs in it wins. Unmatched text is `Unknown`.
    pub fn status_of(&self, text: &str) -> MangaStatus {
        let lower = text.to_lowercase();
        self.status_map
            .iter()
            .find(|rule| !rule.pattern.is_empty() && lower.contains(&rule.pattern.to_lowercase()))
            .map(|rule| rule.status)
            .unwrap_or(MangaStatus::Unknown)
    }

    /// Validates the configuration and compiles its selectors.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] naming the first problem found.
    pub fn compile(self) -> Result<CompiledSource> {
        CompiledSource::new(self)
    }
}

/// Runtime values substituted into selectors and URL templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorVars {
    pub weekday: String,
    pub weekday_short: String,
    pub lang: String,
}

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

impl SelectorVars {
    pub fn at(now: DateTime<Utc>, lang: &str) -> Self {
        Self::for_weekday(now.weekday(), lang)
    }

    pub fn for_weekday(day: Weekday, lang: &str) -> Self {
        let weekday = WEEKDAYS[day.num_days_from_monday() as usize];
        Self {
            weekday: weekday.to_string(),
            weekday_short: weekday[..3].to_string(),
            lang: lang.to_string(),
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "weekday" => Some(&self.weekday),
            "weekday_short" => Some(&self.weekday_short),
            "lang" => Some(&self.lang),
            _ => None,
        }
    }
}

/// Names of the `{placeholders}` in a template, in order of appearance.
pub fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Replaces every `{name}` for which `lookup` has a value.
pub fn expand<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Debug)]
enum CompiledQuery {
    Static(Arc<Query>),
    /// Contains selector placeholders; compiled per substituted expression
    Dynamic {
        template: String,
        cache: Mutex<HashMap<String, Arc<Query>>>,
    },
}

#[derive(Debug)]
struct ArenaEntry {
    query: CompiledQuery,
    attrs: Vec<String>,
}

/// Compiled selectors of one source, keyed by field name.
#[derive(Debug)]
pub struct SelectorArena {
    src: String,
    format: DocumentFormat,
    entries: HashMap<&'static str, ArenaEntry>,
}

impl SelectorArena {
    fn build(src: &str, format: DocumentFormat, selectors: &Selectors) -> Result<Self> {
        let mut arena = Self {
            src: src.to_string(),
            format,
            entries: HashMap::new(),
        };

        let items = [
            ("popular_item", &selectors.popular_item),
            ("latest_item", &selectors.latest_item),
            ("search_item", &selectors.search_item),
            ("collection_item", &selectors.collection_item),
            ("next_page", &selectors.next_page),
            ("load_more", &selectors.load_more),
            ("chapter_item", &selectors.chapter_item),
            ("page_item", &selectors.page_item),
        ];
        for (name, selector) in items {
            if let Some(selector) = selector {
                arena.insert(src, name, selector, Vec::new())?;
            }
        }

        let fields = [
            ("title", selectors.title.as_ref()),
            ("url", selectors.url.as_ref()),
            ("thumbnail", selectors.thumbnail.as_ref()),
            ("next_cursor", selectors.next_cursor.as_ref()),
            ("detail_title", selectors.detail_title.as_ref()),
            ("author", selectors.author.as_ref()),
            ("artist", selectors.artist.as_ref()),
            ("genre", selectors.genre.as_ref()),
            ("description", selectors.description.as_ref()),
            ("status", selectors.status.as_ref()),
            ("chapter_url", Some(&selectors.chapter_url)),
            ("chapter_name", Some(&selectors.chapter_name)),
            ("chapter_date", selectors.chapter_date.as_ref()),
            ("chapter_scanlator", selectors.chapter_scanlator.as_ref()),
        ];
        for (name, spec) in fields {
            if let Some(spec) = spec {
                arena.insert(src, name, &spec.selector, spec.attrs.clone())?;
            }
        }

        Ok(arena)
    }

    fn insert(&mut self, src: &str, name: &'static str, expr: &str, attrs: Vec<String>) -> Result<()> {
        let mut dynamic = false;
        for placeholder in placeholders(expr) {
            if !SELECTOR_PLACEHOLDERS.contains(&placeholder) {
                return Err(Error::invalid_config(
                    src,
                    format!("selector `{name}` uses unknown placeholder {{{placeholder}}}"),
                ));
            }
            dynamic = true;
        }

        let query = if dynamic {
            // Validate with a sample so typos surface at registration.
            let sample_vars = SelectorVars::for_weekday(Weekday::Mon, "en");
            let sample = expand(expr, |p| sample_vars.get(p));
            Query::parse(&sample, self.format)
                .map_err(|e| Error::invalid_config(src, format!("selector `{name}`: {e}")))?;
            CompiledQuery::Dynamic {
                template: expr.to_string(),
                cache: Mutex::new(HashMap::new()),
            }
        } else {
            let query = Query::parse(expr, self.format)
                .map_err(|e| Error::invalid_config(src, format!("selector `{name}`: {e}")))?;
            CompiledQuery::Static(Arc::new(query))
        };

        self.entries.insert(name, ArenaEntry { query, attrs });
        Ok(())
    }

    /// Returns `true` when the field was configured.
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolves a configured field for the given runtime values.
    ///
    /// Returns `Ok(None)` for fields the source does not configure.
    pub fn field(&self, name: &'static str, vars: &SelectorVars) -> Result<Option<Field<'_>>> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };

        let query = match &entry.query {
            CompiledQuery::Static(query) => Arc::clone(query),
            CompiledQuery::Dynamic { template, cache } => {
                let expr = expand(template, |p| vars.get(p));
                let mut cache = cache.lock();
                match cache.get(&expr) {
                    Some(query) => Arc::clone(query),
                    None => {
                        let query = Arc::new(Query::parse(&expr, self.format).map_err(|e| {
                            Error::invalid_config(&self.src, format!("selector `{name}` expands to `{expr}`: {e}"))
                        })?);
                        cache.insert(expr, Arc::clone(&query));
                        query
                    }
                }
            }
        };

        Ok(Some(Field {
            name,
            query,
            attrs: &entry.attrs,
        }))
    }
}

/// A validated source configuration with its compiled selectors.
#[derive(Debug)]
pub struct CompiledSource {
    config: SourceConfig,
    base: Url,
    arena: SelectorArena,
    collection_pagination: HashMap<String, PaginationStrategy>,
    manifest_pattern: Option<Regex>,
}

impl CompiledSource {
    fn new(mut config: SourceConfig) -> Result<Self> {
        config.id = config.id.trim().to_string();
        if config.id.is_empty() {
            return Err(Error::invalid_config("<unnamed>", "source id is empty"));
        }
        let src = config.id.clone();
        if config.name.trim().is_empty() {
            config.name = config.id.clone();
        }

        let base = parse_base(&src, &config.base_url)?;

        if config.rate_limit.permits == 0 || config.rate_limit.period_seconds == 0 {
            return Err(Error::invalid_config(&src, "rate limit permits and period must be positive"));
        }
        if config.timeout_seconds == 0 {
            return Err(Error::invalid_config(&src, "timeout_seconds must be positive"));
        }
        if config.max_retries > MAX_RETRIES_CAP {
            tracing::warn!(source = %src, requested = config.max_retries, "capping max_retries at {MAX_RETRIES_CAP}");
            config.max_retries = MAX_RETRIES_CAP;
        }
        if config.urls.page_size == 0 {
            return Err(Error::invalid_config(&src, "page_size must be positive"));
        }

        validate_templates(&config)?;

        let selectors = &config.selectors;
        let mandatory = [
            ("popular_item", selectors.popular_item.is_some()),
            ("title", selectors.title.is_some()),
            ("url", selectors.url.is_some()),
            ("chapter_item", selectors.chapter_item.is_some()),
            ("page_item", selectors.page_item.is_some()),
        ];
        if let Some((name, _)) = mandatory.iter().find(|(_, present)| !present) {
            return Err(Error::invalid_config(&src, format!("missing mandatory selector `{name}`")));
        }

        let arena = SelectorArena::build(&src, config.format, selectors)?;

        check_pagination(&src, config.pagination, &arena)?;
        let mut collection_pagination = HashMap::new();
        for collection in &config.collections {
            let strategy = match &collection.pagination {
                Some(name) => name.parse::<PaginationStrategy>().map_err(|_| {
                    Error::invalid_config(
                        &src,
                        format!("collection `{}` references unknown pagination `{name}`", collection.label),
                    )
                })?,
                None => config.pagination,
            };
            check_pagination(&src, strategy, &arena)?;
            collection_pagination.insert(collection.path.clone(), strategy);
        }

        let manifest_pattern = validate_page_strategy(&src, &config.page_strategy)?;

        if config.use_alternate_chapter_endpoint && config.urls.chapter_list.is_none() {
            return Err(Error::invalid_config(
                &src,
                "alternate chapter endpoint enabled without urls.chapter_list",
            ));
        }

        Ok(Self {
            config,
            base,
            arena,
            collection_pagination,
            manifest_pattern,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Base URL, always ending with `/`.
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn arena(&self) -> &SelectorArena {
        &self.arena
    }

    /// Compiled manifest pattern of a [`PageStrategy::Manifest`] source.
    pub fn manifest_pattern(&self) -> Option<&Regex> {
        self.manifest_pattern.as_ref()
    }

    /// Pagination strategy for a listing; collections may override it.
    pub fn pagination_for(&self, kind: ListingKind, collection: Option<&str>) -> PaginationStrategy {
        match (kind, collection) {
            (ListingKind::Collection, Some(path)) => self
                .collection_pagination
                .get(path)
                .copied()
                .unwrap_or(self.config.pagination),
            _ => self.config.pagination,
        }
    }

    /// URL template of a listing kind, if the source serves it.
    pub fn listing_template(&self, kind: ListingKind) -> Option<&str> {
        let urls = &self.config.urls;
        match kind {
            ListingKind::Popular => Some(urls.popular.as_str()),
            ListingKind::Latest => urls.latest.as_deref(),
            ListingKind::Search => urls.search.as_deref(),
            ListingKind::Collection => urls.collection.as_deref(),
        }
    }

    /// Arena key of the item selector for a listing kind.
    ///
    /// Kinds without their own selector reuse the popular one.
    pub fn item_field(&self, kind: ListingKind) -> &'static str {
        let own = match kind {
            ListingKind::Popular => "popular_item",
            ListingKind::Latest => "latest_item",
            ListingKind::Search => "search_item",
            ListingKind::Collection => "collection_item",
        };
        if self.arena.has(own) { own } else { "popular_item" }
    }
}

fn parse_base(src: &str, base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url.trim())
        .map_err(|e| Error::invalid_config(src, format!("base_url `{base_url}`: {e}")))?;
    if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
        return Err(Error::invalid_config(src, format!("base_url `{base_url}` is not an absolute http(s) URL")));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

fn validate_templates(config: &SourceConfig) -> Result<()> {
    let src = config.id.as_str();
    let urls = &config.urls;
    if urls.popular.trim().is_empty() {
        return Err(Error::invalid_config(src, "missing popular URL template"));
    }

    let filter_keys: HashSet<&str> = config.filters.iter().map(|f| f.key.as_str()).collect();
    let templates = [
        ("popular", Some(&urls.popular)),
        ("latest", urls.latest.as_ref()),
        ("search", urls.search.as_ref()),
        ("collection", urls.collection.as_ref()),
        ("chapter_list", urls.chapter_list.as_ref()),
        ("chapter_list_body", urls.chapter_list_body.as_ref()),
        ("view_counter", config.view_counter.as_ref().map(|v| &v.url)),
    ];
    for (name, template) in templates {
        let Some(template) = template else { continue };
        if let Some(unknown) = placeholders(template)
            .find(|p| !URL_PLACEHOLDERS.contains(p) && !filter_keys.contains(p))
        {
            return Err(Error::invalid_config(
                src,
                format!("URL template `{name}` uses unknown placeholder {{{unknown}}}"),
            ));
        }
    }

    let search = urls.search.as_deref().unwrap_or_default();
    for filter in config.filters.iter().filter(|f| f.location == FilterLocation::Path) {
        if !placeholders(search).any(|p| p == filter.key) {
            return Err(Error::invalid_config(
                src,
                format!("path filter `{}` has no {{{}}} placeholder in the search template", filter.name, filter.key),
            ));
        }
    }

    if !config.collections.is_empty() && urls.collection.is_none() {
        return Err(Error::invalid_config(src, "collections declared without a collection URL template"));
    }

    Ok(())
}

fn check_pagination(src: &str, strategy: PaginationStrategy, arena: &SelectorArena) -> Result<()> {
    let required = match strategy {
        PaginationStrategy::Selector => "next_page",
        PaginationStrategy::LoadMore => "load_more",
        PaginationStrategy::Never | PaginationStrategy::Always => return Ok(()),
    };
    if arena.has(required) {
        Ok(())
    } else {
        Err(Error::invalid_config(
            src,
            format!("pagination {strategy:?} requires the `{required}` selector"),
        ))
    }
}

fn validate_page_strategy(src: &str, strategy: &PageStrategy) -> Result<Option<Regex>> {
    match strategy {
        PageStrategy::Attribute { attrs } if attrs.is_empty() => {
            Err(Error::invalid_config(src, "attribute page strategy needs at least one attribute"))
        }
        PageStrategy::Base64 { attr } | PageStrategy::Template { attr, .. } if attr.trim().is_empty() => {
            Err(Error::invalid_config(src, "page strategy attribute is empty"))
        }
        PageStrategy::Manifest { attr, pattern, .. } => {
            if attr.is_none() && pattern.is_none() {
                return Err(Error::invalid_config(src, "manifest strategy needs `attr` or `pattern`"));
            }
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| Error::invalid_config(src, format!("manifest pattern: {e}")))
                })
                .transpose()
        }
        _ => Ok(None),
    }
}

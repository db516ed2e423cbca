//! Detail page and chapter list extraction.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::{ChapterOrder, CompiledSource, SelectorVars};
use crate::date::parse_date;
use crate::error::{Error, Result};
use crate::markup::{self, Document, Field, Node};
use crate::types::{ChapterRef, MangaDetail, MangaStatus, MangaSummary};

static LABELED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:chapter|chapitre|cap[ií]tulo|kapitel|ch\.?|ep\.?|episode)\s*[-#:]?\s*(\d+(?:[.,]\d+)?)")
        .expect("valid regex")
});
static SLUG_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:chapter|chapitre|capitulo|ch|ep)[-_]?(\d+)(?:[-_.](\d+))?").expect("valid regex"));
static ANY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"));

/// Extracts metadata from a detail document.
///
/// The title comes from the `detail_title` field, falling back to the
/// `og:title` meta tag. Multiple authors or artists are joined with `", "`;
/// genres keep page order without duplicates. `chapters` is left empty.
///
/// # Errors
///
/// [`Error::RequiredFieldMissing`] when no title can be found.
pub fn parse_detail(
    source: &CompiledSource,
    manga_url: &str,
    doc: &Document,
    vars: &SelectorVars,
) -> Result<MangaDetail> {
    let config = source.config();
    let arena = source.arena();
    let root = doc.root();

    let title = arena
        .field("detail_title", vars)?
        .and_then(|f| f.read_in(doc))
        .or_else(|| doc.meta("og:title"))
        .ok_or_else(|| Error::required_field("detail_title"))?;

    let joined = |name: &'static str| -> Result<Option<String>> {
        let values = match arena.field(name, vars)? {
            Some(field) => dedupe(field.read_all(&root)),
            None => Vec::new(),
        };
        Ok((!values.is_empty()).then(|| values.join(", ")))
    };
    let author = joined("author")?;
    let artist = joined("artist")?;

    let genres = match arena.field("genre", vars)? {
        Some(field) => dedupe(field.read_all(&root)),
        None => Vec::new(),
    };

    let description = match arena.field("description", vars)? {
        Some(field) => {
            let paragraphs = field.read_all(&root);
            (!paragraphs.is_empty()).then(|| paragraphs.join("\n"))
        }
        None => None,
    };

    let status = arena
        .field("status", vars)?
        .and_then(|f| f.read_in(doc))
        .map(|text| config.status_of(&text))
        .unwrap_or(MangaStatus::Unknown);

    let thumbnail_url = doc
        .meta("og:image")
        .and_then(|raw| markup::absolute_url(source.base(), &raw));

    Ok(MangaDetail {
        summary: MangaSummary {
            title,
            url: manga_url.to_string(),
            thumbnail_url,
            source_id: config.id.clone(),
        },
        author,
        artist,
        genres,
        description,
        status,
        chapters: Vec::new(),
    })
}

/// Extracts the chapter nodes of a document, in page order.
///
/// Chapters without a URL or name, or linking to another host, are skipped;
/// a URL already in `seen` is skipped too and new URLs are added to it. An
/// unparsable date leaves `uploaded_at` empty.
pub fn parse_chapters(
    source: &CompiledSource,
    doc: &Document,
    vars: &SelectorVars,
    now: DateTime<Utc>,
    seen: &mut HashSet<String>,
) -> Result<Vec<ChapterRef>> {
    let arena = source.arena();
    let item = arena
        .field("chapter_item", vars)?
        .ok_or_else(|| Error::invalid_config(source.id(), "missing `chapter_item` selector"))?;
    let fields = ChapterFields {
        url: arena
            .field("chapter_url", vars)?
            .ok_or_else(|| Error::invalid_config(source.id(), "missing `chapter_url` selector"))?,
        name: arena
            .field("chapter_name", vars)?
            .ok_or_else(|| Error::invalid_config(source.id(), "missing `chapter_name` selector"))?,
        date: arena.field("chapter_date", vars)?,
        scanlator: arena.field("chapter_scanlator", vars)?,
    };

    let mut chapters = Vec::new();
    for (index, node) in doc.select(&item.query).iter().enumerate() {
        match chapter_from(source, node, &fields, now) {
            Ok(chapter) => {
                if seen.insert(chapter.url.clone()) {
                    chapters.push(chapter);
                }
            }
            Err(Error::RequiredFieldMissing { field }) => {
                tracing::debug!(source = %source.id(), index, %field, "skipping chapter");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(chapters)
}

struct ChapterFields<'c> {
    url: Field<'c>,
    name: Field<'c>,
    date: Option<Field<'c>>,
    scanlator: Option<Field<'c>>,
}

fn chapter_from(
    source: &CompiledSource,
    node: &Node<'_>,
    fields: &ChapterFields<'_>,
    now: DateTime<Utc>,
) -> Result<ChapterRef> {
    let config = source.config();
    let raw_url = fields.url.require(node)?;
    let url = markup::relative_url(source.base(), &raw_url).ok_or_else(|| Error::required_field("chapter_url"))?;
    let name = fields.name.require(node)?;

    let number = chapter_number(&name).or_else(|| chapter_number_from_url(&url));
    let uploaded_at = fields
        .date
        .as_ref()
        .and_then(|f| f.read(node))
        .and_then(|text| parse_date(&text, &config.date, now));
    let scanlator = fields
        .scanlator
        .as_ref()
        .and_then(|f| f.read(node))
        .or_else(|| config.scanlator.clone());

    Ok(ChapterRef {
        name,
        url,
        number,
        uploaded_at,
        scanlator,
    })
}

/// Applies the configured ordering. `Site` keeps the list untouched;
/// numeric orders keep chapters without a number at the end, in site order.
pub fn order_chapters(mut chapters: Vec<ChapterRef>, order: ChapterOrder) -> Vec<ChapterRef> {
    match order {
        ChapterOrder::Site => {}
        ChapterOrder::NumberAscending => chapters.sort_by(|a, b| compare_numbers(a.number, b.number, false)),
        ChapterOrder::NumberDescending => chapters.sort_by(|a, b| compare_numbers(a.number, b.number, true)),
    }
    chapters
}

fn compare_numbers(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending { ordering.reverse() } else { ordering }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Chapter number written in a chapter name: `Chapter 12.5`, `Ch. 3`,
/// `Capítulo 7`; a bare number is accepted as a last resort.
pub fn chapter_number(name: &str) -> Option<f64> {
    if let Some(caps) = LABELED_NUMBER.captures(name) {
        return caps[1].replace(',', ".").parse().ok();
    }
    ANY_NUMBER.captures(name).and_then(|caps| caps[1].parse().ok())
}

/// Chapter number in a URL slug: `/manga/x/chapter-12-5/` is 12.5.
pub fn chapter_number_from_url(url: &str) -> Option<f64> {
    let caps = SLUG_NUMBER.captures(url)?;
    let number = match caps.get(2) {
        Some(fraction) => format!("{}.{}", &caps[1], fraction.as_str()),
        None => caps[1].to_string(),
    };
    number.parse().ok()
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.to_lowercase()))
        .collect()
}

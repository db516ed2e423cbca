//! Chapter date parsing.
//!
//! Sites print upload dates in every shape imaginable: a configured
//! `strftime` pattern in the site's language ("12 mars 2024"), relative text
//! ("3 hours ago", "il y a 2 jours"), or machine formats in JSON APIs.
//! [`parse_date`] tries them in that order and returns `None` rather than an
//! error when nothing fits, so one odd date never fails a chapter list.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Date settings of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateConfig {
    /// chrono `strftime` pattern, e.g. `%B %d, %Y` or `%d/%m/%Y`
    #[serde(default = "default_format")]
    pub format: String,

    /// Language of month names and relative phrases (`en`, `fr`, `es`, ...)
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_format() -> String {
    "%B %d, %Y".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            locale: default_locale(),
        }
    }
}

impl DateConfig {
    pub fn new(format: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            locale: locale.into(),
        }
    }
}

const ENGLISH_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

static ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th|er)\b").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+\.?").expect("valid regex"));

/// Parses a chapter date string.
///
/// `now` anchors relative phrases; passing it in keeps the function pure.
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use hondana::date::{parse_date, DateConfig};
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
/// let fr = DateConfig::new("%d %B %Y", "fr");
///
/// let parsed = parse_date("2 mars 2024", &fr, now).unwrap();
/// assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
///
/// let relative = parse_date("il y a 3 jours", &fr, now).unwrap();
/// assert_eq!(relative, Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap());
///
/// assert_eq!(parse_date("bientôt", &fr, now), None);
/// ```
pub fn parse_date(text: &str, config: &DateConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    parse_formatted(text, config)
        .or_else(|| parse_relative(text, now))
        .or_else(|| parse_machine(text))
}

fn parse_formatted(text: &str, config: &DateConfig) -> Option<DateTime<Utc>> {
    let normalized = normalize(text, &config.locale);

    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, &config.format) {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(&normalized, &config.format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Strips ordinal suffixes and rewrites localized month names in English.
fn normalize(text: &str, locale: &str) -> String {
    let text = ORDINAL.replace_all(text, "$1");
    let table = month_names(locale);
    if table.is_empty() {
        return text.into_owned();
    }

    WORD.replace_all(&text, |caps: &regex::Captures| {
        let word = &caps[0];
        let key = word.trim_end_matches('.').to_lowercase();
        match table.iter().find(|(name, _)| *name == key) {
            Some((_, month)) => ENGLISH_MONTHS[*month as usize - 1].to_string(),
            None => word.to_string(),
        }
    })
    .into_owned()
}

fn month_names(locale: &str) -> &'static [(&'static str, u32)] {
    let lang = locale.split(['-', '_']).next().unwrap_or_default();
    match lang.to_ascii_lowercase().as_str() {
        "fr" => &[
            ("janvier", 1), ("janv", 1), ("février", 2), ("fevrier", 2), ("févr", 2), ("fevr", 2),
            ("mars", 3), ("avril", 4), ("avr", 4), ("mai", 5), ("juin", 6), ("juillet", 7),
            ("juil", 7), ("août", 8), ("aout", 8), ("septembre", 9), ("sept", 9),
            ("octobre", 10), ("oct", 10), ("novembre", 11), ("nov", 11), ("décembre", 12),
            ("decembre", 12), ("déc", 12), ("dec", 12),
        ],
        "es" => &[
            ("enero", 1), ("ene", 1), ("febrero", 2), ("feb", 2), ("marzo", 3), ("mar", 3),
            ("abril", 4), ("abr", 4), ("mayo", 5), ("may", 5), ("junio", 6), ("jun", 6),
            ("julio", 7), ("jul", 7), ("agosto", 8), ("ago", 8), ("septiembre", 9),
            ("setiembre", 9), ("sep", 9), ("sept", 9), ("octubre", 10), ("oct", 10),
            ("noviembre", 11), ("nov", 11), ("diciembre", 12), ("dic", 12),
        ],
        "pt" => &[
            ("janeiro", 1), ("jan", 1), ("fevereiro", 2), ("fev", 2), ("março", 3),
            ("marco", 3), ("mar", 3), ("abril", 4), ("abr", 4), ("maio", 5), ("mai", 5),
            ("junho", 6), ("jun", 6), ("julho", 7), ("jul", 7), ("agosto", 8), ("ago", 8),
            ("setembro", 9), ("set", 9), ("outubro", 10), ("out", 10), ("novembro", 11),
            ("nov", 11), ("dezembro", 12), ("dez", 12),
        ],
        "de" => &[
            ("januar", 1), ("jan", 1), ("februar", 2), ("feb", 2), ("märz", 3), ("maerz", 3),
            ("mär", 3), ("april", 4), ("apr", 4), ("mai", 5), ("juni", 6), ("jun", 6),
            ("juli", 7), ("jul", 7), ("august", 8), ("aug", 8), ("september", 9),
            ("sep", 9), ("oktober", 10), ("okt", 10), ("november", 11), ("nov", 11),
            ("dezember", 12), ("dez", 12),
        ],
        "it" => &[
            ("gennaio", 1), ("gen", 1), ("febbraio", 2), ("feb", 2), ("marzo", 3), ("mar", 3),
            ("aprile", 4), ("apr", 4), ("maggio", 5), ("mag", 5), ("giugno", 6), ("giu", 6),
            ("luglio", 7), ("lug", 7), ("agosto", 8), ("ago", 8), ("settembre", 9),
            ("set", 9), ("ottobre", 10), ("ott", 10), ("novembre", 11), ("nov", 11),
            ("dicembre", 12), ("dic", 12),
        ],
        "id" => &[
            ("januari", 1), ("februari", 2), ("maret", 3), ("april", 4), ("mei", 5),
            ("juni", 6), ("juli", 7), ("agustus", 8), ("september", 9), ("oktober", 10),
            ("november", 11), ("desember", 12),
        ],
        _ => &[],
    }
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.to_lowercase();

    const NOW: [&str; 5] = ["just now", "à l'instant", "a l'instant", "ahora", "agora"];
    const TODAY: [&str; 7] = ["today", "aujourd'hui", "hoy", "hoje", "heute", "oggi", "hari ini"];
    const YESTERDAY: [&str; 7] = ["yesterday", "hier", "ayer", "ontem", "gestern", "ieri", "kemarin"];

    if NOW.iter().any(|w| lower.contains(w)) || TODAY.iter().any(|w| lower.contains(w)) {
        return Some(now);
    }
    if YESTERDAY.iter().any(|w| lower.contains(w)) {
        return Some(now - Duration::days(1));
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    const MARKERS: [&str; 8] = ["ago", "hace", "há", "atrás", "vor", "fa", "lalu", "yang"];
    let marked = lower.contains("il y a") || tokens.iter().any(|t| MARKERS.contains(t));
    if !marked {
        return None;
    }

    const ARTICLES: [&str; 12] = [
        "a", "an", "un", "une", "una", "uno", "um", "uma", "ein", "eine", "einem", "einer",
    ];
    for (i, token) in tokens.iter().enumerate() {
        let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
        let (amount, unit_word) = if digits > 0 {
            // Compact forms like "3h" or "2d" carry the unit in the same token.
            let rest = &token[digits..];
            let word = if rest.is_empty() { tokens.get(i + 1).copied() } else { Some(rest) };
            (token[..digits].parse::<u32>().ok(), word)
        } else if ARTICLES.contains(token) {
            (Some(1), tokens.get(i + 1).copied())
        } else {
            continue;
        };

        if let (Some(amount), Some(unit)) = (amount, unit_word.and_then(unit_of)) {
            return shift(now, amount, unit);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

fn unit_of(word: &str) -> Option<Unit> {
    let w = word;
    let unit = if w.starts_with("sec") || w.starts_with("seg") || w.starts_with("sek") || w.starts_with("detik") {
        Unit::Second
    } else if w.starts_with("minggu")
        || w.starts_with("week")
        || w.starts_with("semaine")
        || w.starts_with("semana")
        || w.starts_with("woche")
        || w.starts_with("settiman")
        || w == "w"
    {
        Unit::Week
    } else if w.starts_with("min") || w.starts_with("menit") {
        Unit::Minute
    } else if w == "h"
        || w.starts_with("hour")
        || w.starts_with("hr")
        || w.starts_with("heure")
        || w.starts_with("hora")
        || w.starts_with("stunde")
        || w == "ora"
        || w == "ore"
        || w == "jam"
    {
        Unit::Hour
    } else if w.starts_with("month")
        || w.starts_with("mois")
        || w.starts_with("mes")
        || w.starts_with("monat")
        || w.starts_with("bulan")
    {
        Unit::Month
    } else if w == "d"
        || w.starts_with("day")
        || w.starts_with("jour")
        || w.starts_with("día")
        || w.starts_with("dia")
        || w.starts_with("tag")
        || w.starts_with("giorn")
        || w.starts_with("hari")
    {
        Unit::Day
    } else if w == "y"
        || w.starts_with("year")
        || w == "an"
        || w == "ans"
        || w.starts_with("ann")
        || w.starts_with("año")
        || w.starts_with("ano")
        || w.starts_with("jahr")
        || w.starts_with("tahun")
    {
        Unit::Year
    } else {
        return None;
    };
    Some(unit)
}

fn shift(now: DateTime<Utc>, amount: u32, unit: Unit) -> Option<DateTime<Utc>> {
    let amount_i = i64::from(amount);
    match unit {
        Unit::Second => now.checked_sub_signed(Duration::seconds(amount_i)),
        Unit::Minute => now.checked_sub_signed(Duration::minutes(amount_i)),
        Unit::Hour => now.checked_sub_signed(Duration::hours(amount_i)),
        Unit::Day => now.checked_sub_signed(Duration::days(amount_i)),
        Unit::Week => now.checked_sub_signed(Duration::weeks(amount_i)),
        Unit::Month => now.checked_sub_months(Months::new(amount)),
        Unit::Year => now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
    }
}

/// ISO-8601, RFC-3339 and unix timestamps, as served by JSON APIs.
fn parse_machine(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let value: i64 = text.parse().ok()?;
        // 13 digits and up are milliseconds.
        return if text.len() >= 13 {
            Utc.timestamp_millis_opt(value).single()
        } else {
            Utc.timestamp_opt(value, 0).single()
        };
    }
    None
}

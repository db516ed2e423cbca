//! JSON navigation for API-backed sources.
//!
//! Selectors of JSON sources are dot paths (`data.items.title`). A path walks
//! objects by key and arrays either by index (`items.0`) or by mapping the
//! remaining path over every element, so `data.items.title` yields one value
//! per item.
//!
//! # Examples
//!
//! ```rust
//! use hondana::net::json;
//! use serde_json::json;
//!
//! let data = json!({
//!     "data": {
//!         "items": [
//!             {"title": "One Piece", "genres": ["Action", "Adventure"]},
//!             {"title": "Naruto", "genres": ["Action"]}
//!         ]
//!     }
//! });
//!
//! let titles: Vec<_> = json::select_path(&data, &json::split_path("data.items.title"))
//!     .into_iter()
//!     .filter_map(json::scalar_text)
//!     .collect();
//! assert_eq!(titles, vec!["One Piece", "Naruto"]);
//!
//! assert_eq!(json::select_path(&data, &json::split_path("data.items.0.genres")).len(), 2);
//! ```

use serde_json::Value;

/// Splits a dot path into segments, ignoring empty ones.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Every value reached by `path`, with arrays at the end of the path
/// flattened into their elements.
pub fn select_path<'a>(json: &'a Value, path: &[String]) -> Vec<&'a Value> {
    let mut current = vec![json];

    for key in path {
        current = current.into_iter().flat_map(|value| step(value, key)).collect();
        if current.is_empty() {
            break;
        }
    }

    current.into_iter().flat_map(flatten).collect()
}

/// First value reached by `path`, without flattening.
///
/// ```rust
/// use hondana::net::json;
/// use serde_json::json;
///
/// let data = json!({"manga": {"title": "One Piece", "id": 123}});
/// let title = json::extract_path(&data, "manga.title");
/// assert_eq!(title.and_then(|v| v.as_str()), Some("One Piece"));
/// assert_eq!(json::extract_path(&data, "manga.author"), None);
/// ```
pub fn extract_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;

    for key in split_path(path) {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            other => other.get(&key)?,
        };
    }

    Some(current)
}

/// String form of a scalar; `None` for null, empty strings and containers.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// JavaScript-style truthiness, used for has-next flags in API responses.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn step<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    match value {
        Value::Object(map) => map.get(key).into_iter().collect(),
        Value::Array(items) => match key.parse::<usize>() {
            Ok(index) => items.get(index).into_iter().collect(),
            Err(_) => items.iter().flat_map(|item| step(item, key)).collect(),
        },
        _ => Vec::new(),
    }
}

fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

//! Search filters: static descriptors and the values a caller selects.
//!
//! A source declares a closed list of [`FilterDescriptor`]s in its
//! configuration. Callers answer with [`FilterValue`]s, which
//! [`resolve`] turns into query parameters and path segments in
//! declaration order, so the same inputs always build the same URL.
//!
//! ```rust
//! use hondana::filter::{resolve, FilterDescriptor, FilterKind, FilterValue, SelectOption};
//!
//! let filters = vec![FilterDescriptor::select(
//!     "Status",
//!     "status",
//!     vec![SelectOption::new("Any", ""), SelectOption::new("Completed", "end")],
//! )];
//!
//! let resolved = resolve(&filters, &[FilterValue::select("Status", 1)]);
//! assert_eq!(resolved.query, vec![("status".to_string(), "end".to_string())]);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One option of a [`FilterKind::Select`] filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// The closed set of filter shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    /// Free text, sent as typed
    Text,
    /// One option out of a fixed list; `default` is used when nothing is selected
    Select {
        options: Vec<SelectOption>,
        #[serde(default)]
        default: usize,
    },
    /// On/off switch sending `value` when checked
    Checkbox { value: String },
}

/// Where a resolved filter value ends up in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLocation {
    /// Appended as `key=value` to the query string
    #[default]
    Query,
    /// Substituted for the `{key}` placeholder in the URL template
    Path,
}

/// Static description of a filter offered by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Display name, also accepted when matching [`FilterValue`]s
    pub name: String,

    /// Query parameter name or path placeholder name
    pub key: String,

    #[serde(flatten)]
    pub kind: FilterKind,

    #[serde(default)]
    pub location: FilterLocation,
}

impl FilterDescriptor {
    pub fn text(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            kind: FilterKind::Text,
            location: FilterLocation::Query,
        }
    }

    pub fn select(name: impl Into<String>, key: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            kind: FilterKind::Select {
                options,
                default: 0,
            },
            location: FilterLocation::Query,
        }
    }

    pub fn checkbox(name: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            kind: FilterKind::Checkbox {
                value: value.into(),
            },
            location: FilterLocation::Query,
        }
    }

    /// Moves the filter from the query string into a path placeholder.
    pub fn in_path(mut self) -> Self {
        self.location = FilterLocation::Path;
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.name == name || self.key == name
    }
}

/// A value chosen by the caller for one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterValue {
    Text { name: String, value: String },
    Select { name: String, index: usize },
    Checkbox { name: String, checked: bool },
}

impl FilterValue {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FilterValue::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn select(name: impl Into<String>, index: usize) -> Self {
        FilterValue::Select {
            name: name.into(),
            index,
        }
    }

    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        FilterValue::Checkbox {
            name: name.into(),
            checked,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FilterValue::Text { name, .. }
            | FilterValue::Select { name, .. }
            | FilterValue::Checkbox { name, .. } => name,
        }
    }
}

/// Filter values resolved against their descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFilters {
    /// Query parameters in descriptor order
    pub query: Vec<(String, String)>,

    /// Path placeholder values; every path filter has an entry, possibly empty
    pub path: BTreeMap<String, String>,
}

/// Resolves caller values against the declared filters.
///
/// Values naming an unknown filter, or whose shape does not match the
/// descriptor (text for a select, an out-of-range option index), are ignored.
/// Several values for the same query filter produce repeated parameters.
pub fn resolve(descriptors: &[FilterDescriptor], values: &[FilterValue]) -> ResolvedFilters {
    let mut resolved = ResolvedFilters::default();

    for descriptor in descriptors {
        let mut chosen: Vec<String> = values
            .iter()
            .filter(|v| descriptor.matches(v.name()))
            .filter_map(|v| value_for(descriptor, v))
            .collect();

        if chosen.is_empty() {
            if let FilterKind::Select { options, default } = &descriptor.kind {
                if let Some(option) = options.get(*default) {
                    chosen.push(option.value.clone());
                }
            }
        }

        match descriptor.location {
            FilterLocation::Query => {
                for value in chosen.into_iter().filter(|v| !v.is_empty()) {
                    resolved.query.push((descriptor.key.clone(), value));
                }
            }
            FilterLocation::Path => {
                let value = chosen.into_iter().find(|v| !v.is_empty()).unwrap_or_default();
                resolved.path.insert(descriptor.key.clone(), value);
            }
        }
    }

    resolved
}

fn value_for(descriptor: &FilterDescriptor, value: &FilterValue) -> Option<String> {
    match (&descriptor.kind, value) {
        (FilterKind::Text, FilterValue::Text { value, .. }) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        (FilterKind::Select { options, .. }, FilterValue::Select { index, .. }) => {
            options.get(*index).map(|o| o.value.clone())
        }
        (FilterKind::Checkbox { value: on }, FilterValue::Checkbox { checked, .. }) => {
            checked.then(|| on.clone())
        }
        _ => {
            tracing::debug!(filter = %descriptor.name, "ignoring filter value of mismatched kind");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre_filters() -> Vec<FilterDescriptor> {
        vec![
            FilterDescriptor::checkbox("Action", "genre[]", "action"),
            FilterDescriptor::checkbox("Comedy", "genre[]", "comedy"),
            FilterDescriptor::text("Author", "author"),
            FilterDescriptor::select(
                "Type",
                "type",
                vec![SelectOption::new("Manga", "manga"), SelectOption::new("Manhwa", "manhwa")],
            )
            .in_path(),
        ]
    }

    #[test]
    fn resolves_in_declaration_order() {
        let values = vec![
            FilterValue::text("author", "  Oda "),
            FilterValue::checkbox("Comedy", true),
            FilterValue::checkbox("Action", true),
        ];
        let resolved = resolve(&genre_filters(), &values);

        assert_eq!(
            resolved.query,
            vec![
                ("genre[]".to_string(), "action".to_string()),
                ("genre[]".to_string(), "comedy".to_string()),
                ("author".to_string(), "Oda".to_string()),
            ]
        );
        // Unselected path select falls back to its default option.
        assert_eq!(resolved.path.get("type").map(String::as_str), Some("manga"));
    }

    #[test]
    fn ignores_mismatched_and_unknown_values() {
        let values = vec![
            FilterValue::select("Author", 3),
            FilterValue::text("Unknown", "x"),
            FilterValue::select("Type", 9),
            FilterValue::checkbox("Action", false),
        ];
        let resolved = resolve(&genre_filters(), &values);

        assert!(resolved.query.is_empty());
        assert_eq!(resolved.path.get("type").map(String::as_str), Some("manga"));
    }

    #[test]
    fn select_in_path_uses_chosen_option() {
        let resolved = resolve(&genre_filters(), &[FilterValue::select("Type", 1)]);
        assert_eq!(resolved.path.get("type").map(String::as_str), Some("manhwa"));
    }
}

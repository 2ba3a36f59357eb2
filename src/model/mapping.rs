use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which columns of a source sheet hold the category and the amount. Indices are zero-based.
/// `None` means no column was found for that role, in which case the source contributes nothing.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ColumnMapping {
    pub category: Option<usize>,
    pub amount: Option<usize>,
}

impl ColumnMapping {
    pub fn new(category: Option<usize>, amount: Option<usize>) -> Self {
        Self { category, amount }
    }

    /// Both indices, if both are present.
    pub fn both(&self) -> Option<(usize, usize)> {
        Some((self.category?, self.amount?))
    }

    /// Drops any index that does not point into a header row of `width` columns.
    pub(crate) fn bounded(self, width: usize) -> Self {
        Self {
            category: self.category.filter(|&ix| ix < width),
            amount: self.amount.filter(|&ix| ix < width),
        }
    }
}

/// Maps each raw category string seen in a run to its canonical name. The mapping is total over
/// the categories it was built from: anything missing maps to itself.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapping(BTreeMap<String, String>);

impl CategoryMapping {
    /// Every category maps to itself.
    pub fn identity(categories: &BTreeSet<String>) -> Self {
        Self(
            categories
                .iter()
                .map(|c| (c.clone(), c.clone()))
                .collect(),
        )
    }

    /// Builds a mapping over `categories` from a (possibly partial) suggestion. Keys that are not
    /// in `categories` are ignored. Categories without a usable suggestion map to themselves.
    pub fn with_suggestions(
        categories: &BTreeSet<String>,
        suggestions: &BTreeMap<String, String>,
    ) -> Self {
        Self(
            categories
                .iter()
                .map(|raw| {
                    let canonical = suggestions
                        .get(raw)
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .unwrap_or(raw.as_str());
                    (raw.clone(), canonical.to_string())
                })
                .collect(),
        )
    }

    /// The canonical name for `raw`.
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.0.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_column_mapping_both() {
        assert_eq!(ColumnMapping::new(Some(1), Some(2)).both(), Some((1, 2)));
        assert_eq!(ColumnMapping::new(None, Some(2)).both(), None);
        assert_eq!(ColumnMapping::new(Some(1), None).both(), None);
    }

    #[test]
    fn test_column_mapping_bounded() {
        let mapping = ColumnMapping::new(Some(1), Some(7)).bounded(3);
        assert_eq!(mapping, ColumnMapping::new(Some(1), None));
    }

    #[test]
    fn test_column_mapping_json() {
        let mapping: ColumnMapping =
            serde_json::from_str(r#"{"category": 0, "amount": null}"#).unwrap();
        assert_eq!(mapping, ColumnMapping::new(Some(0), None));
    }

    #[test]
    fn test_identity() {
        let mapping = CategoryMapping::identity(&set(&["Food", "Travel"]));
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.canonical("Food"), "Food");
        assert_eq!(mapping.canonical("Travel"), "Travel");
    }

    #[test]
    fn test_with_suggestions_fills_gaps() {
        let categories = set(&["Camera Gear", "Photography Supplies", "Food"]);
        let mut suggestions = BTreeMap::new();
        suggestions.insert("Camera Gear".to_string(), "Photography".to_string());
        suggestions.insert(
            "Photography Supplies".to_string(),
            " Photography ".to_string(),
        );
        suggestions.insert("Invented".to_string(), "Nonsense".to_string());

        let mapping = CategoryMapping::with_suggestions(&categories, &suggestions);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.canonical("Camera Gear"), "Photography");
        assert_eq!(mapping.canonical("Photography Supplies"), "Photography");
        assert_eq!(mapping.canonical("Food"), "Food");
        assert!(mapping.iter().all(|(raw, _)| raw != "Invented"));
    }

    #[test]
    fn test_with_suggestions_blank_is_identity() {
        let categories = set(&["Food"]);
        let mut suggestions = BTreeMap::new();
        suggestions.insert("Food".to_string(), "   ".to_string());
        let mapping = CategoryMapping::with_suggestions(&categories, &suggestions);
        assert_eq!(mapping.canonical("Food"), "Food");
    }
}

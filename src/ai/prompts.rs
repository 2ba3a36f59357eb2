//! Prompt text sent to the language model.

use std::collections::BTreeSet;

/// The token the liveness probe asks the model to echo.
pub(super) const READY: &str = "READY";

pub(super) fn probe() -> String {
    format!("This is a connectivity check. Reply with exactly the word {READY} and nothing else.")
}

/// Asks which header holds the category and which holds the amount.
pub(super) fn classify<S: AsRef<str>>(headers: &[S]) -> String {
    let listing: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(ix, h)| format!("{ix}: {}", h.as_ref()))
        .collect();
    format!(
        r#"You are looking at the header row of a spreadsheet of expenses. The columns are listed below as "index: header".

{}

Identify:
- "category": the column that labels what kind of expense each row is (for example a category, type or group of the purchase).
- "amount": the column that holds the money spent on each row (for example a cost, price or amount).

Answer with only a JSON object of the form {{"category": <index or null>, "amount": <index or null>}}. Use the zero-based index from the list. Use null when no column fits."#,
        listing.join("\n")
    )
}

/// Asks the model to group similar category names under one canonical name each.
pub(super) fn normalize(categories: &BTreeSet<String>) -> String {
    let listing: Vec<String> = categories.iter().map(|c| format!("- {c}")).collect();
    format!(
        r#"Here are expense category names collected from several spreadsheets:

{}

Some of them mean the same thing but are spelled or worded differently (for example "Camera Gear" and "Photography Supplies"). Group semantically similar names under a single canonical name. Names that have no close match keep their own name.

Answer with only a JSON object that maps every name above, exactly as written, to its canonical name."#,
        listing.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prompt_lists_indices() {
        let prompt = classify(&["Item", "Category", "Cost"]);
        assert!(prompt.contains("0: Item\n1: Category\n2: Cost"));
        assert!(prompt.contains(r#"{"category": <index or null>, "amount": <index or null>}"#));
    }

    #[test]
    fn test_normalize_prompt_lists_categories() {
        let categories: BTreeSet<String> =
            ["Food", "Catering"].iter().map(|s| s.to_string()).collect();
        let prompt = normalize(&categories);
        assert!(prompt.contains("- Catering\n- Food"));
    }

    #[test]
    fn test_probe_mentions_token() {
        assert!(probe().contains(READY));
    }
}

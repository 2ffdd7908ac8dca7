//! Prompt templates for dish explanation.
//!
//! Plain `format!()` interpolation keeps missing variables a compile-time
//! problem.

use std::collections::BTreeSet;

pub const EXPLAINER_SYSTEM_PROMPT: &str =
    "You are a helpful food explainer. Respond with a short, clear explanation.";

/// Build the explanation prompt for one dish.
///
/// The explanation is bounded to `max_words` words, written in `language`,
/// and folds in the menu's own description and dietary markers when
/// present.
///
/// # Example
/// ```
/// use std::collections::BTreeSet;
/// use menulens::llm::prompts::dish_explanation_prompt;
///
/// let tags = BTreeSet::from(["vegan".to_string()]);
/// let prompt = dish_explanation_prompt("Pad Thai", Some("rice noodles"), &tags, "en", 60);
/// assert!(prompt.contains("Pad Thai"));
/// assert!(prompt.contains("vegan"));
/// ```
pub fn dish_explanation_prompt(
    name: &str,
    description: Option<&str>,
    dietary_tags: &BTreeSet<String>,
    language: &str,
    max_words: usize,
) -> String {
    let mut prompt = format!(
        "Explain the following dish for a menu in a friendly, concise way \
         (max {max_words} words). Include dietary notes if available. \
         Respond in the language with ISO code '{language}'.\n\nDish: {name}"
    );

    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nDescription: {description}"));
    }

    if !dietary_tags.is_empty() {
        let tags = dietary_tags.iter().cloned().collect::<Vec<_>>().join(", ");
        prompt.push_str(&format!("\nDietary notes: {tags}"));
    }

    prompt
}

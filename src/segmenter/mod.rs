//! Heuristic menu segmentation: classifies layout lines into sections,
//! dishes, prices, and descriptions, and assembles the section tree.
//!
//! Classification is per line, in document order, first match wins:
//! price-only, section header, dish name, then description. The same rules
//! apply with or without font tiers; tiers only strengthen the first two
//! checks.

mod heuristics;

pub use heuristics::SegmenterConfig;

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Dish, FontTier, LayoutLine, MenuSection};

use heuristics::contains_word;

/// Confidence assigned to a dish classified via font tier.
const TIER_DISH_CONFIDENCE: f32 = 0.9;
/// Confidence assigned to a dish classified via the Title-Case fallback.
const TEXTUAL_DISH_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, Default)]
pub struct MenuSegmenter {
    config: SegmenterConfig,
}

impl MenuSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Build the section tree from ordered lines. Returns an empty list
    /// when no line qualifies as a dish; the caller decides whether that is
    /// fatal.
    pub fn segment(&self, lines: &[LayoutLine]) -> Vec<MenuSection> {
        let mut sections: Vec<MenuSection> = Vec::new();
        let mut current: Option<MenuSection> = None;
        // A dish stays open for prices and description lines until the next
        // dish or section starts.
        let mut dish_open = false;

        for line in lines {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }

            if self.config.price_line.is_match(text) {
                if dish_open {
                    if let Some(dish) = current.as_mut().and_then(|s| s.dishes.last_mut()) {
                        if dish.price.is_none() {
                            dish.price = Some(text.to_string());
                        }
                    }
                }
                continue;
            }

            if self.is_section_header(text, line.tier) {
                if let Some(finished) = current.take() {
                    if !finished.dishes.is_empty() {
                        sections.push(finished);
                    }
                }
                current = Some(MenuSection::new(text));
                dish_open = false;
                continue;
            }

            if let Some(dish) = self.as_dish(text, line.tier) {
                current
                    .get_or_insert_with(|| {
                        MenuSection::new(self.config.default_section_name.clone())
                    })
                    .dishes
                    .push(dish);
                dish_open = true;
                continue;
            }

            if dish_open {
                if let Some(dish) = current.as_mut().and_then(|s| s.dishes.last_mut()) {
                    match dish.original_description.as_mut() {
                        Some(existing) => {
                            existing.push(' ');
                            existing.push_str(text);
                        }
                        None => dish.original_description = Some(text.to_string()),
                    }
                    self.harvest_dietary_tags(text, dish);
                }
            }
        }

        if let Some(finished) = current {
            if !finished.dishes.is_empty() {
                sections.push(finished);
            }
        }

        sections
    }

    /// Overall scan confidence in [0,100]: scales with extracted text
    /// volume, plus fixed boosts for having found structure at all.
    pub fn confidence(total_chars: usize, sections: &[MenuSection]) -> u8 {
        let mut score = (total_chars / 2).min(50);
        if !sections.is_empty() {
            score += 30;
        }
        if sections.iter().any(|s| !s.dishes.is_empty()) {
            score += 20;
        }
        score.min(100) as u8
    }

    fn is_section_header(&self, text: &str, tier: Option<FontTier>) -> bool {
        if tier == Some(FontTier::Section) {
            return true;
        }

        let chars = text.graphemes(true).count();
        let in_bounds =
            chars >= self.config.min_section_chars && chars <= self.config.max_section_chars;
        if !in_bounds {
            return false;
        }

        if is_all_caps(text) {
            return true;
        }

        // Keyword headers match the whole line, not a substring: "Desserts"
        // is a header, "Margherita Pizza" is a dish even though it contains
        // "pizza".
        let normalized = text.to_lowercase();
        let normalized = normalized.trim().trim_end_matches(':').trim_end();
        self.config
            .section_keywords
            .iter()
            .any(|keyword| keyword == normalized)
    }

    fn as_dish(&self, text: &str, tier: Option<FontTier>) -> Option<Dish> {
        let (name, price) = match self.config.trailing_price.captures(text) {
            Some(caps) => (
                caps.name("name").map(|m| m.as_str().trim())?.to_string(),
                Some(caps.name("price").map(|m| m.as_str())?.to_string()),
            ),
            None => (text.to_string(), None),
        };

        let confidence = if tier == Some(FontTier::Dish) {
            TIER_DISH_CONFIDENCE
        } else {
            let chars = name.graphemes(true).count();
            let in_bounds = chars >= self.config.min_dish_chars && chars <= self.config.max_dish_chars;
            if !in_bounds || !is_title_case(&name) {
                return None;
            }
            TEXTUAL_DISH_CONFIDENCE
        };

        let mut dish = Dish::new(name, confidence);
        dish.price = price;
        Some(dish)
    }

    fn harvest_dietary_tags(&self, text: &str, dish: &mut Dish) {
        let lower = text.to_lowercase();
        for keyword in &self.config.dietary_keywords {
            if contains_word(&lower, keyword) {
                dish.dietary_tags.insert(keyword.clone());
            }
        }
    }
}

fn is_all_caps(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic()) && text == text.to_uppercase()
}

/// Title-Case heuristic: the line leads with a capital and at least half of
/// its alphabetic words are capitalized.
fn is_title_case(text: &str) -> bool {
    if is_all_caps(text) {
        return false;
    }
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .collect();
    if words.is_empty() {
        return false;
    }
    let capitalized = words
        .iter()
        .filter(|w| w.chars().next().map(char::is_uppercase).unwrap_or(false))
        .count();
    words[0].chars().next().map(char::is_uppercase).unwrap_or(false)
        && capitalized * 2 >= words.len()
}

use regex::Regex;

/// Every heuristic constant the segmenter relies on, in one place: keyword
/// lists, price patterns, and length bounds. Call sites never carry their
/// own literals.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Lowercase section-header keywords, matched against the whole
    /// normalized line.
    pub section_keywords: Vec<String>,
    /// Lowercase dietary markers harvested into dish tags.
    pub dietary_keywords: Vec<String>,
    /// Matches a line that is nothing but a price.
    pub price_line: Regex,
    /// Captures a price trailing a dish name on the same physical line.
    pub trailing_price: Regex,
    pub min_section_chars: usize,
    pub max_section_chars: usize,
    pub min_dish_chars: usize,
    pub max_dish_chars: usize,
    /// Section synthesized when dishes appear before any header.
    pub default_section_name: String,
}

const PRICE_PATTERN: &str = r"^(?:[$€£¥₹]\s*)?\d+(?:[.,]\d{1,2})?(?:\s*[$€£¥₹])?$";
const TRAILING_PRICE_PATTERN: &str =
    r"^(?P<name>.*\S)\s+(?P<price>(?:[$€£¥₹]\s*)?\d+(?:[.,]\d{1,2})?(?:\s*[$€£¥₹])?)$";

const SECTION_KEYWORDS: &[&str] = &[
    "appetizers",
    "starters",
    "entrees",
    "main courses",
    "mains",
    "desserts",
    "drinks",
    "beverages",
    "sides",
    "salads",
    "soups",
    "pasta",
    "pizza",
    "burgers",
    "sandwiches",
    "breakfast",
    "lunch",
    "dinner",
    "specials",
];

const DIETARY_KEYWORDS: &[&str] = &[
    "vegan",
    "vegetarian",
    "gluten-free",
    "gluten free",
    "dairy-free",
    "nut-free",
    "spicy",
    "halal",
    "kosher",
    "organic",
];

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            section_keywords: SECTION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            dietary_keywords: DIETARY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            price_line: Regex::new(PRICE_PATTERN).expect("price pattern compiles"),
            trailing_price: Regex::new(TRAILING_PRICE_PATTERN)
                .expect("trailing price pattern compiles"),
            min_section_chars: 3,
            max_section_chars: 40,
            min_dish_chars: 3,
            max_dish_chars: 80,
            default_section_name: "Menu Items".to_string(),
        }
    }
}

impl SegmenterConfig {
    /// Merge localized section keywords on top of the defaults.
    pub fn with_extra_section_keywords(mut self, extra: &[String]) -> Self {
        for keyword in extra {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !self.section_keywords.contains(&keyword) {
                self.section_keywords.push(keyword);
            }
        }
        self
    }
}

/// Word-boundary containment check: `needle` (possibly multi-word) appears
/// in `haystack` without bleeding into neighboring alphanumerics.
/// Both sides are expected lowercase.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let at = start + pos;
        let end = at + needle.len();
        let before_ok = at == 0
            || !haystack[..at]
                .chars()
                .next_back()
                .map(char::is_alphanumeric)
                .unwrap_or(false);
        let after_ok = end == haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .map(char::is_alphanumeric)
                .unwrap_or(false);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_line_matches_currency_forms() {
        let config = SegmenterConfig::default();
        for line in ["$8", "$ 12.50", "19", "12,50", "8.99", "12 €", "€12.00", "₹250"] {
            assert!(config.price_line.is_match(line), "should match: {line}");
        }
    }

    #[test]
    fn price_line_rejects_text() {
        let config = SegmenterConfig::default();
        for line in ["Bruschetta", "Table 4 window", "$8 with fries", "12.50 euros"] {
            assert!(!config.price_line.is_match(line), "should not match: {line}");
        }
    }

    #[test]
    fn trailing_price_splits_name_and_price() {
        let config = SegmenterConfig::default();
        let caps = config.trailing_price.captures("Grilled Salmon $19").expect("captures");
        assert_eq!(&caps["name"], "Grilled Salmon");
        assert_eq!(&caps["price"], "$19");

        let caps = config.trailing_price.captures("Pad Thai 12,50").expect("captures");
        assert_eq!(&caps["name"], "Pad Thai");
        assert_eq!(&caps["price"], "12,50");
    }

    #[test]
    fn contains_word_respects_boundaries() {
        assert!(contains_word("main courses", "main courses"));
        assert!(contains_word("our mains today", "mains"));
        assert!(!contains_word("romaine salad", "mains"));
        assert!(!contains_word("romaine salad", "main"));
        assert!(contains_word("gluten-free crust", "gluten-free"));
    }

    #[test]
    fn extra_keywords_merge_without_duplicates() {
        let config = SegmenterConfig::default()
            .with_extra_section_keywords(&["Antipasti".to_string(), "mains".to_string()]);
        assert!(config.section_keywords.contains(&"antipasti".to_string()));
        let mains = config
            .section_keywords
            .iter()
            .filter(|k| k.as_str() == "mains")
            .count();
        assert_eq!(mains, 1);
    }
}

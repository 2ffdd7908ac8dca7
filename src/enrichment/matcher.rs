use crate::models::CachedExplanation;

/// Lowercase, strip punctuation, collapse whitespace. Both sides of every
/// comparison go through this.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a dish name against the store, trying exact, then substring,
/// then token-overlap matching, in that priority order. The first rule
/// that yields a hit wins; ties within a rule go to the earliest stored
/// entry.
pub fn find_best_match<'a>(
    dish_name: &str,
    entries: &'a [CachedExplanation],
) -> Option<&'a CachedExplanation> {
    let target = normalize_name(dish_name);
    if target.is_empty() {
        return None;
    }

    if let Some(exact) = entries.iter().find(|e| normalize_name(&e.name) == target) {
        return Some(exact);
    }

    if let Some(partial) = entries.iter().find(|e| {
        let candidate = normalize_name(&e.name);
        !candidate.is_empty() && (candidate.contains(&target) || target.contains(&candidate))
    }) {
        return Some(partial);
    }

    let target_words: Vec<&str> = target.split(' ').collect();
    entries.iter().find(|e| {
        let candidate = normalize_name(&e.name);
        candidate.split(' ').any(|candidate_word| {
            target_words.iter().any(|target_word| {
                candidate_word.contains(target_word) || target_word.contains(candidate_word)
            })
        })
    })
}

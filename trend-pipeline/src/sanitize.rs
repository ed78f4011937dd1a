/// Product words a trend name must not carry, removed in this order.
pub const DENYLIST: [&str; 14] = [
    "chat widget",
    "twitch chat widget",
    "stream overlay",
    "overlay",
    "stream alerts",
    "alerts",
    "alert",
    "streaming",
    "stream",
    "tutorial",
    "setup",
    "pack",
    "theme",
    "widget",
];

pub const MAX_NAME_WORDS: usize = 6;

/// Strip product words from a judge-supplied name and title-case what is left.
///
/// Removal is by substring, so `"Overlayed"` loses its `overlay`. When nothing
/// survives the original name is returned as given.
pub fn sanitize_trend_name(name: &str) -> String {
    let normalized = collapse_whitespace(name);
    if normalized.is_empty() {
        return normalized;
    }

    let mut lowered = normalized.to_lowercase();
    for phrase in DENYLIST {
        if lowered.contains(phrase) {
            lowered = lowered
                .split(phrase)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    let cleaned = collapse_whitespace(&lowered);
    if cleaned.is_empty() {
        return name.to_string();
    }

    cleaned
        .split(' ')
        .take(MAX_NAME_WORDS)
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases every letter that follows a non-letter, so `neo-tokyo` becomes `Neo-Tokyo`.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut after_letter = false;
    for c in word.chars() {
        if after_letter {
            out.push(c);
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_product_word_between_aesthetic_words() {
        assert_eq!(sanitize_trend_name("Neon Overlay Glow"), "Neon Glow");
    }

    #[test]
    fn test_removes_multi_word_phrases_and_normalizes_case() {
        assert_eq!(
            sanitize_trend_name("  cozy   PIXEL farm Twitch Chat Widget "),
            "Cozy Pixel Farm Twitch"
        );
        assert_eq!(sanitize_trend_name("Vaporwave Stream Alerts"), "Vaporwave");
    }

    #[test]
    fn test_substring_removal_matches_inside_words() {
        assert_eq!(sanitize_trend_name("Themed Sunset"), "D Sunset");
    }

    #[test]
    fn test_fully_stripped_name_returns_original() {
        assert_eq!(sanitize_trend_name("Stream Overlay Pack"), "Stream Overlay Pack");
        assert_eq!(sanitize_trend_name("widget"), "widget");
    }

    #[test]
    fn test_title_case_restarts_after_hyphens_and_apostrophes() {
        assert_eq!(sanitize_trend_name("neo-tokyo night"), "Neo-Tokyo Night");
        assert_eq!(sanitize_trend_name("90's mall goth"), "90'S Mall Goth");
        assert_eq!(sanitize_trend_name("y2k chrome"), "Y2K Chrome");
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(sanitize_trend_name(""), "");
        assert_eq!(sanitize_trend_name("   "), "");
    }

    #[test]
    fn test_caps_at_six_words() {
        assert_eq!(
            sanitize_trend_name("one two three four five six seven eight"),
            "One Two Three Four Five Six"
        );
    }

    #[test]
    fn test_never_empty_for_non_blank_input() {
        for name in ["alert", "Setup Tutorial", "a", "Chrome Noir", "pack theme widget"] {
            assert!(!sanitize_trend_name(name).is_empty(), "{name}");
        }
    }
}

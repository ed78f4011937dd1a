use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const KEYWORD_PATTERNS: &[&str] = &[
    r"\boverlay(?:s)?\b",
    r"\bwidget(?:s)?\b",
    r"\bhud\b",
    r"\btheme(?:s)?\b",
    r"\baesthetic(?:s)?\b",
    r"\bplugin(?:s)?\b",
    r"\btransition(?:s)?\b",
    r"\bstinger(?:s)?\b",
    r"\balert(?:s)?\b",
    r"\bchat\s?box(?:es)?\b",
    r"\bpanel(?:s)?\b",
    r"\bcozy\b",
    r"\bcyberpunk\b",
    r"\boutrun\b",
    r"\bretro\b",
    r"\bpixel\b",
    r"\bsetup(?:s)?\b",
    r"\bstation(?:s)?\b",
    r"\bdesk(?:s)?\b",
    r"\broom(?:s)?\b",
    r"\bvibe(?:s)?\b",
    r"\blayout(?:s)?\b",
    r"\brebrand(?:ing)?\b",
    r"\basset(?:s)?\b",
    r"\bdesign(?:s|er)?\b",
    r"\bvtuber\smodel(?:s)?\b",
    r"\bemote(?:s)?\b",
    r"\bbadge(?:s)?\b",
    r"\bshowcase\b",
    r"\binspiration\b",
];

// Support and troubleshooting threads, never aesthetics.
const BLACKLIST_PATTERNS: &[&str] = &[
    r"\berror(?:s)?\b",
    r"\bcrash(?:es|ed|ing)?\b",
    r"\bbug(?:s)?\b",
    r"\bbroken\b",
    r"\bhow\s+to\s+fix\b",
    r"\bbitrate\b",
    r"\bdropped\s+frames?\b",
    r"\bstutter(?:ing)?\b",
    r"\bdisconnect(?:ed|ion|ing)?\b",
    r"\blogin\b",
    r"\bpassword\b",
    r"\bdriver(?:s)?\b",
    r"\bblack\s+screen\b",
    r"\bblue\s+screen\b",
];

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| alternation(KEYWORD_PATTERNS));
static BLACKLIST_RE: LazyLock<Regex> = LazyLock::new(|| alternation(BLACKLIST_PATTERNS));

fn alternation(patterns: &[&str]) -> Regex {
    Regex::new(&format!("(?i){}", patterns.join("|"))).expect("valid filter regex")
}

/// Decides which posts are worth storing.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    visual_subreddits: HashSet<String>,
}

impl PostFilter {
    pub fn new<I, S>(visual_subreddits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            visual_subreddits: visual_subreddits.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_visual(&self, subreddit: &str) -> bool {
        self.visual_subreddits.contains(subreddit)
    }

    /// A blacklist hit always drops the post. Visual communities are kept
    /// wholesale; anywhere else a keyword has to match.
    pub fn should_keep(&self, subreddit: &str, full_text: &str) -> bool {
        if BLACKLIST_RE.is_match(full_text) {
            return false;
        }
        self.is_visual(subreddit) || KEYWORD_RE.is_match(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PostFilter {
        PostFilter::new(["unixporn", "PixelArt"])
    }

    #[test]
    fn test_blacklist_beats_visual_subreddit() {
        assert!(!filter().should_keep("unixporn", "my rice keeps crashing after update"));
        assert!(!filter().should_keep("PixelArt", "Black Screen when exporting"));
    }

    #[test]
    fn test_visual_subreddit_needs_no_keyword() {
        assert!(filter().should_keep("unixporn", "[Hyprland] first rice"));
    }

    #[test]
    fn test_other_subreddits_need_a_keyword() {
        assert!(!filter().should_keep("Twitch", "just hit affiliate today"));
        assert!(filter().should_keep("Twitch", "new animated Overlay for my channel"));
        assert!(filter().should_keep("Twitch", "custom chatbox with pixel font"));
    }

    #[test]
    fn test_matching_respects_word_boundaries() {
        assert!(!filter().should_keep("OBS", "overlaying two sources"));
        assert!(filter().should_keep("OBS", "bugsy overlay pack"));
        assert!(!filter().should_keep("OBS", "overlay bug after update"));
    }

    #[test]
    fn test_visual_lookup_is_case_sensitive() {
        assert!(filter().is_visual("PixelArt"));
        assert!(!filter().is_visual("pixelart"));
    }
}

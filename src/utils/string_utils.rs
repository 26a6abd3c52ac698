use std::sync::LazyLock;
use deunicode::deunicode;
use regex::Regex;

static SLUG_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Channel slug used for `target_channels` matching: `"Globo SP (HD)"` becomes `"globo-sp-hd"`.
pub fn channel_slug(name: &str) -> String {
    let normalized = deunicode(name.trim()).to_lowercase();
    SLUG_SEPARATOR.replace_all(&normalized, "-").trim_matches('-').to_string()
}

/// Source flags arrive as `true`, `1`, `"sim"`, `"ao vivo"` and friends.
pub fn is_truthy(value: &str) -> bool {
    matches!(deunicode(value.trim()).to_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "sim" | "s" | "live" | "ao vivo" | "aovivo")
}

/// Collapses inner whitespace and strips dangling separators left behind after removing
/// a fragment from a title, e.g. `"Jornal -  "` becomes `"Jornal"`.
pub fn tidy_text(text: &str) -> String {
    let collapsed = MULTI_SPACE.replace_all(text.trim(), " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ':' || c == ',' || c == '|')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_slug() {
        assert_eq!(channel_slug("Globo SP (HD)"), "globo-sp-hd");
        assert_eq!(channel_slug("  SporTV 2 "), "sportv-2");
        assert_eq!(channel_slug("Récord São Paulo"), "record-sao-paulo");
        assert_eq!(channel_slug("ge-tv"), "ge-tv");
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy(" Sim "));
        assert!(is_truthy("AO VIVO"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
    }

    #[test]
    fn test_tidy_text() {
        assert_eq!(tidy_text("Jornal Nacional -  "), "Jornal Nacional");
        assert_eq!(tidy_text(" - Futebol:  Brasil x Chile "), "Futebol: Brasil x Chile");
        assert_eq!(tidy_text("   "), "");
    }
}

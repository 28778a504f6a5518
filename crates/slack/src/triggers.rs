/// What a message outside any active session asks the bot to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    SetName(String),
    CurateLink(String),
    Shutdown,
    Identity,
    WhoAmI,
}

/// Maps free text to an intent. Triggers are case-insensitive; declaration
/// order below is dispatch priority.
pub fn classify(text: &str) -> Option<Intent> {
    let lowered = text.to_lowercase();

    if has_word(&lowered, "hello") || has_word(&lowered, "hi") {
        return Some(Intent::Greeting);
    }
    if let Some(name) = extract_name(text) {
        return Some(Intent::SetName(name));
    }
    if let Some(link) = extract_link(text) {
        return Some(Intent::CurateLink(link));
    }
    if has_word(&lowered, "shutdown") {
        return Some(Intent::Shutdown);
    }
    if lowered.contains("who are you")
        || lowered.contains("identify yourself")
        || lowered.contains("what is your name")
        || has_word(&lowered, "uptime")
    {
        return Some(Intent::Identity);
    }
    if lowered.contains("who am i") || lowered.contains("what is my name") {
        return Some(Intent::WhoAmI);
    }

    None
}

fn has_word(lowered: &str, word: &str) -> bool {
    lowered.split(|ch: char| !ch.is_ascii_alphanumeric()).any(|token| token == word)
}

fn extract_name(text: &str) -> Option<String> {
    for prefix in ["call me", "my name is"] {
        if let Some(index) = find_ascii_ci(text, prefix) {
            let rest = text[index + prefix.len()..].trim();
            if !rest.is_empty() {
                return Some(rest.to_owned());
            }
        }
    }
    None
}

/// Pulls a link out of the message. The chat surface wraps URLs in angle
/// brackets (optionally with a `|label` suffix); a bare `http(s)://` token is
/// accepted as a fallback.
fn extract_link(text: &str) -> Option<String> {
    if let Some(start) = text.find('<') {
        if let Some(length) = text[start + 1..].find('>') {
            let inner = &text[start + 1..start + 1 + length];
            let url = inner.split('|').next().unwrap_or(inner);
            if is_link(url) {
                return Some(url.to_owned());
            }
        }
    }

    text.split_whitespace().find(|token| is_link(token)).map(str::to_owned)
}

fn is_link(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

/// Case-insensitive substring search for an ASCII needle, returning the byte
/// offset of the match.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&index| haystack[index..index + needle.len()].eq_ignore_ascii_case(needle))
}

/// Folds seconds into the largest sensible unit, singular when exactly one.
pub fn format_uptime(uptime_secs: u64) -> String {
    let (value, unit) = if uptime_secs >= 3600 {
        (uptime_secs / 3600, "hour")
    } else if uptime_secs >= 60 {
        (uptime_secs / 60, "minute")
    } else {
        (uptime_secs, "second")
    };

    if value == 1 {
        format!("{value} {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, format_uptime, Intent};

    #[test]
    fn greets_on_hello_and_hi() {
        assert_eq!(classify("hello"), Some(Intent::Greeting));
        assert_eq!(classify("Hi there"), Some(Intent::Greeting));
        // "hi" must match as a word, not a fragment
        assert_eq!(classify("this is nothing"), None);
    }

    #[test]
    fn extracts_nickname_preserving_case() {
        assert_eq!(classify("call me Ada"), Some(Intent::SetName("Ada".to_owned())));
        assert_eq!(
            classify("My name is Grace Hopper"),
            Some(Intent::SetName("Grace Hopper".to_owned()))
        );
        assert_eq!(classify("call me"), None);
    }

    #[test]
    fn extracts_bracket_wrapped_links() {
        assert_eq!(
            classify("look at <http://example.com/a>"),
            Some(Intent::CurateLink("http://example.com/a".to_owned()))
        );
        assert_eq!(
            classify("see <https://example.com/a|this article>"),
            Some(Intent::CurateLink("https://example.com/a".to_owned()))
        );
    }

    #[test]
    fn extracts_bare_links() {
        assert_eq!(
            classify("new post https://example.com/b today"),
            Some(Intent::CurateLink("https://example.com/b".to_owned()))
        );
    }

    #[test]
    fn recognizes_shutdown_and_identity() {
        assert_eq!(classify("shutdown"), Some(Intent::Shutdown));
        assert_eq!(classify("who are you?"), Some(Intent::Identity));
        assert_eq!(classify("please identify yourself"), Some(Intent::Identity));
        assert_eq!(classify("uptime"), Some(Intent::Identity));
        assert_eq!(classify("who am I?"), Some(Intent::WhoAmI));
        assert_eq!(classify("what is my name"), Some(Intent::WhoAmI));
    }

    #[test]
    fn unmatched_text_maps_to_nothing() {
        assert_eq!(classify("what a lovely day"), None);
    }

    #[test]
    fn uptime_folds_units_and_pluralizes() {
        assert_eq!(format_uptime(1), "1 second");
        assert_eq!(format_uptime(42), "42 seconds");
        assert_eq!(format_uptime(60), "1 minute");
        assert_eq!(format_uptime(150), "2 minutes");
        assert_eq!(format_uptime(3600), "1 hour");
        assert_eq!(format_uptime(7500), "2 hours");
    }
}

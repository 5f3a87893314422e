use std::sync::OnceLock;

use regex::Regex;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex is valid"))
}

fn trailing_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+$").expect("punctuation regex is valid"))
}

/// Canonicalize claim text for deduplication: lowercase, strip quote
/// characters, collapse whitespace, strip trailing sentence punctuation.
///
/// Quotes are stripped before the trailing punctuation so the result is
/// stable under re-normalization (`normalize(normalize(x)) == normalize(x)`).
pub fn normalize_claim(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['"', '\''], "");
    let collapsed = whitespace_re().replace_all(lowered.trim(), " ");
    trailing_punct_re().replace(&collapsed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "The sky is Blue.",
            "  \"Quoted   claim!\"  ",
            "Ends with a question?\"",
            "multiple\t\nwhitespace   runs",
            "",
            "...",
            "'''",
        ];
        for input in inputs {
            let once = normalize_claim(input);
            assert_eq!(normalize_claim(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn case_punctuation_and_quotes_normalize_to_same_value() {
        let a = normalize_claim("The sky is Blue.");
        let b = normalize_claim("the sky is blue");
        let c = normalize_claim("\"THE SKY IS BLUE!\"");
        assert_eq!(a, "the sky is blue");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn internal_whitespace_collapses_to_single_spaces() {
        assert_eq!(
            normalize_claim("inflation  rose \t by\n2 percent"),
            "inflation rose by 2 percent"
        );
    }

    #[test]
    fn only_trailing_punctuation_is_stripped() {
        assert_eq!(
            normalize_claim("U.S. inflation fell.").contains("u.s."),
            true
        );
        assert_eq!(normalize_claim("Really?!"), "really");
    }

    #[test]
    fn empty_and_punctuation_only_inputs_normalize_to_empty() {
        assert_eq!(normalize_claim(""), "");
        assert_eq!(normalize_claim("  !?  "), "");
        assert_eq!(normalize_claim("\"'\""), "");
    }
}

use regex::Regex;
use std::sync::OnceLock;

/// Reduce raw OCR text to its first "number + unit" token, e.g. `250.5 g`.
///
/// Symbols are stripped first (whitespace is kept), then the first run of
/// digits with an optional decimal part followed by letters is taken. Returns
/// an empty string when nothing matches.
pub fn clean(raw: &str) -> String {
    static SYMBOLS_RE: OnceLock<Regex> = OnceLock::new();
    let symbols_re = SYMBOLS_RE.get_or_init(|| Regex::new(r"[^0-9A-Za-z.\s]").unwrap());

    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let token_re =
        TOKEN_RE.get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?\s*[A-Za-z]+").unwrap());

    let filtered = symbols_re.replace_all(raw, "");
    token_re
        .find(&filtered)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

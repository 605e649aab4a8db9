/// Shorten a bearer token so it can be logged without leaking it.
pub(crate) fn redact(token: &str) -> String {
    const VISIBLE: usize = 6;

    match token.char_indices().nth(VISIBLE) {
        Some((end, _)) => format!("{}...", &token[..end]),
        None => String::from("..."),
    }
}

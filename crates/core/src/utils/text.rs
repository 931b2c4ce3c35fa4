//! Small text helpers shared by pattern generation and registration.

/// Lowercases and collapses a name into a stable `snake_case` code.
///
/// `"Dr. Kamdi Irondi"` becomes `"dr_kamdi_irondi"`. Non-alphanumeric runs
/// collapse into one underscore; leading and trailing separators are dropped.
pub fn slugify_code(input: &str) -> String {
    let mut code = String::with_capacity(input.len());
    let mut pending_separator = false;

    for ch in input.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !code.is_empty() {
                code.push('_');
            }
            pending_separator = false;
            code.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    code
}

/// Splits a display name into `(first, last)`.
///
/// Leading honorifics such as "Dr." are skipped. A single-word name yields an
/// empty last name.
pub fn split_display_name(display_name: &str) -> (String, String) {
    let words: Vec<&str> = display_name
        .split_whitespace()
        .filter(|w| !is_honorific(w))
        .collect();

    match words.as_slice() {
        [] => (String::new(), String::new()),
        [only] => ((*only).to_string(), String::new()),
        [first, .., last] => ((*first).to_string(), (*last).to_string()),
    }
}

fn is_honorific(word: &str) -> bool {
    let bare = word.trim_end_matches('.').to_lowercase();
    matches!(bare.as_str(), "dr" | "doctor" | "mr" | "mrs" | "ms" | "prof")
}

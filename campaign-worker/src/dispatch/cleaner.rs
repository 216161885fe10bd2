//! Provider error message cleaning.
//!
//! SDK-style provider errors arrive wrapped in terminal colour codes and
//! boilerplate. Only the human-readable cause is persisted.

use std::sync::LazyLock;

use regex::Regex;

/// Marker preceding the provider's own explanation.
const INFO_MARKER: &str = "Twilio returned the following information:";

/// Marker following the explanation; everything after it is a docs link.
const MORE_INFO_MARKER: &str = "More information may be available here:";

/// ANSI escape sequences: single-character escapes and CSI sequences.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid regex")
});

/// Reduce a provider error string to the part worth showing to a user.
///
/// Strips ANSI escapes. If the provider boilerplate is present, keeps only
/// the text between the two markers, trimmed; otherwise returns the stripped
/// string as is. Repeated until nothing changes, so cleaning a cleaned
/// message is a no-op.
pub fn clean_error_message(raw: &str) -> String {
    let mut current = clean_once(raw);
    loop {
        // Every effective pass removes at least one character.
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(raw, "");

    match stripped.split_once(INFO_MARKER) {
        Some((_, rest)) => {
            let main = rest.split(MORE_INFO_MARKER).next().unwrap_or_default();
            main.trim().to_string()
        }
        None => stripped.into_owned(),
    }
}

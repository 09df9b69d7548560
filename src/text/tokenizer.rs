//! Tokenization: lowercase, replace every non-word/non-digit character with
//! a space, split on whitespace, drop empties.

/// Split `text` into lowercase word/digit tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    normalized
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("Hello, World! 2026"),
            vec!["hello", "world", "2026"]
        );
    }

    #[test]
    fn drops_empties() {
        assert_eq!(tokenize("   ..  "), Vec::<String>::new());
    }

    #[test]
    fn unicode_alphanumeric_is_kept() {
        assert_eq!(tokenize("caf\u{e9} bar"), vec!["caf\u{e9}", "bar"]);
    }
}

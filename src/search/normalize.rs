use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Folds a display string into its searchable form: NFD decomposition,
/// combining marks dropped, then lowercased.
pub fn searchable(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Unanchored substring pattern for a caller query.
pub fn pattern(query: &str) -> String {
    regex::escape(&searchable(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_and_case() {
        assert_eq!(searchable("Zoé"), "zoe");
        assert_eq!(searchable("ÀNITA"), "anita");
        assert_eq!(searchable("São Paulo"), "sao paulo");
        assert_eq!(searchable("Caen"), "caen");
    }

    #[test]
    fn leaves_unaccented_text_alone() {
        assert_eq!(searchable("ana01"), "ana01");
        assert_eq!(searchable(""), "");
    }

    #[test]
    fn pattern_escapes_regex_metacharacters() {
        assert_eq!(pattern("A.B"), "a\\.b");
        assert_eq!(pattern("(Éric)"), "\\(eric\\)");
    }
}

/// Escape `s` for embedding between single quotes in a filter clause.
///
/// Backslashes are escaped before quotes are doubled so that an escaped quote
/// can never be reinterpreted.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "''")
}

/// Quote `s` as a single-quoted string literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", escape(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote("Bob's API"), "'Bob''s API'");
    }

    #[test]
    fn test_quote_escapes_backslashes_first() {
        assert_eq!(quote(r"a\'b"), r"'a\\''b'");
    }

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(quote("PizzaShackAPI"), "'PizzaShackAPI'");
    }
}

//! Shell quoting for generated command lines

/// Quote `s` for POSIX shells, leaving plain words untouched
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '=' | '@' | '+' | '%')
        });
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words_unquoted() {
        assert_eq!(shell_quote("cuda/9.0"), "cuda/9.0");
        assert_eq!(
            shell_quote("device=cuda,floatX=float32"),
            "device=cuda,floatX=float32"
        );
    }

    #[test]
    fn test_special_characters_quoted() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}

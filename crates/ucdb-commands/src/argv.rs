//! Argument splitting.

use crate::error::UsageError;

/// Split a command's argument string into words.
///
/// Words are separated by whitespace. A word opening with `"` runs to the
/// matching closing quote and keeps both quotes, so callers can tell a
/// quoted variable name from a bare cluster name.
pub fn split(args: &str) -> Result<Vec<String>, UsageError> {
    let mut words = Vec::new();
    let mut chars = args.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut word = String::new();
        if c == '"' {
            word.push(c);
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => {
                        word.push('"');
                        break;
                    }
                    Some(ch) => word.push(ch),
                    None => return Err(UsageError::UnterminatedQuote(word)),
                }
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
        }
        words.push(word);
    }
    Ok(words)
}

/// Contents of a `"quoted"` word.
pub fn unquote(word: &str) -> Option<&str> {
    word.strip_prefix('"')?.strip_suffix('"')
}

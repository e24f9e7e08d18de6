//! Glob patterns for bulk invalidation.
//!
//! The shared store matches Redis glob syntax natively (`SCAN ... MATCH`).
//! The local store needs the same semantics, so globs are translated into a
//! regex anchored at both ends:
//!
//! | Glob | Meaning |
//! |------|---------|
//! | `*` | any run of characters, including `:` |
//! | `?` | exactly one character |
//! | `[abc]`, `[a-z]` | one character from the class |
//! | `[!abc]`, `[^abc]` | one character not in the class |
//! | `\x` | literal `x` |
//!
//! As with `SCAN ... MATCH`, `*` and `?` also match a newline.

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Compiled glob pattern.
#[derive(Clone, Debug)]
pub struct GlobPattern {
    glob: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob.
    ///
    /// # Errors
    /// Returns `Error::InvalidPattern` for an empty glob or an unterminated
    /// character class.
    pub fn new(glob: &str) -> Result<Self> {
        let regex = RegexBuilder::new(&glob_to_regex(glob)?)
            .dot_matches_new_line(true)
            .build()?;
        Ok(GlobPattern {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

/// Translate a glob into an anchored regex source string.
pub fn glob_to_regex(glob: &str) -> Result<String> {
    if glob.is_empty() {
        return Err(Error::InvalidPattern("empty pattern".to_string()));
    }

    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '[' => {
                let mut class = String::from("[");
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut first = true;
                while let Some(cc) = chars.next() {
                    match cc {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped) => {
                                class.push_str(&regex::escape(&escaped.to_string()))
                            }
                            None => class.push_str(r"\\"),
                        },
                        '[' | ']' | '&' | '~' => {
                            class.push('\\');
                            class.push(cc);
                        }
                        _ => class.push(cc),
                    }
                    first = false;
                }
                if !closed {
                    return Err(Error::InvalidPattern(format!(
                        "unterminated character class in '{}'",
                        glob
                    )));
                }
                class.push(']');
                out.push_str(&class);
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_star() {
        let p = GlobPattern::new("booking:*").unwrap();
        assert!(p.is_match("booking:ABC123"));
        assert!(p.is_match("booking:"));
        assert!(p.is_match("booking:ABC:legs"));
        assert!(!p.is_match("session:ABC123"));
        assert!(!p.is_match("xbooking:ABC123"));
    }

    #[test]
    fn test_anchored_at_both_ends() {
        let p = GlobPattern::new("flight:ET500").unwrap();
        assert!(p.is_match("flight:ET500"));
        assert!(!p.is_match("flight:ET5000"));
        assert!(!p.is_match("cached:flight:ET500"));
    }

    #[test]
    fn test_question_mark() {
        let p = GlobPattern::new("pricing:zone?:standard").unwrap();
        assert!(p.is_match("pricing:zone3:standard"));
        assert!(!p.is_match("pricing:zone12:standard"));
    }

    #[test]
    fn test_wildcards_match_newline() {
        let p = GlobPattern::new("booking:*").unwrap();
        assert!(p.is_match("booking:AB\nC"));

        let p = GlobPattern::new("booking:AB?C").unwrap();
        assert!(p.is_match("booking:AB\nC"));
    }

    #[test]
    fn test_character_classes() {
        let p = GlobPattern::new("zone[1-3]").unwrap();
        assert!(p.is_match("zone2"));
        assert!(!p.is_match("zone4"));

        let p = GlobPattern::new("zone[!1-3]").unwrap();
        assert!(p.is_match("zone4"));
        assert!(!p.is_match("zone2"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = GlobPattern::new("user.name+(1)").unwrap();
        assert!(p.is_match("user.name+(1)"));
        assert!(!p.is_match("userXname+(1)"));
    }

    #[test]
    fn test_escaped_glob_characters() {
        let p = GlobPattern::new(r"literal\*star").unwrap();
        assert!(p.is_match("literal*star"));
        assert!(!p.is_match("literalXstar"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(GlobPattern::new(""), Err(Error::InvalidPattern(_))));
        assert!(matches!(
            GlobPattern::new("zone[12"),
            Err(Error::InvalidPattern(_))
        ));
    }
}

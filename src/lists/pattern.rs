use crate::error::FormatError;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[sdi%]").expect("placeholder regex is valid"));

pub const SLOTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Slot,
}

/// A parsed entry pattern such as `"%i. %s [%s]"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pieces: Vec<Piece>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, FormatError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for m in PLACEHOLDER.find_iter(pattern) {
            literal.push_str(&pattern[last..m.start()]);
            last = m.end();

            if m.as_str() == "%%" {
                literal.push('%');
                continue;
            }
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Slot);
        }
        literal.push_str(&pattern[last..]);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        let found = pieces.iter().filter(|p| **p == Piece::Slot).count();
        if found != SLOTS {
            return Err(FormatError::PatternSlots {
                expected: SLOTS,
                found,
            });
        }
        Ok(Self { pieces })
    }

    pub fn render(&self, args: [&dyn Display; SLOTS]) -> String {
        let mut out = String::new();
        let mut args = args.into_iter();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Slot => {
                    if let Some(arg) = args.next() {
                        out.push_str(&arg.to_string());
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_pattern() {
        let pattern = Pattern::parse("%i. %s [%s]").unwrap();
        assert_eq!(pattern.render([&1, &"Alice", &"U1"]), "1. Alice [U1]");
    }

    #[test]
    fn test_percent_escape() {
        let pattern = Pattern::parse("%d%% %s%s").unwrap();
        assert_eq!(pattern.render([&50, &"a", &"b"]), "50% ab");
    }

    #[test]
    fn test_wrong_slot_count() {
        assert_eq!(
            Pattern::parse("%s - %s"),
            Err(FormatError::PatternSlots {
                expected: 3,
                found: 2
            })
        );
    }
}

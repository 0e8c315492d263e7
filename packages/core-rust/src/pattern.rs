//! Glob pattern compilation and matching.
//!
//! A [`GlobPattern`] is compiled once and matched against any number of
//! candidate strings. The whole candidate must match (patterns are anchored
//! at both ends).
//!
//! Supported syntax:
//!
//! | Syntax      | Matches                                  |
//! |-------------|------------------------------------------|
//! | `*`         | any run of characters, including none    |
//! | `?`         | exactly one character                    |
//! | `[abc]`     | one of the listed characters             |
//! | `[a-z]`     | one character in the range               |
//! | `[!abc]`    | one character not listed                 |
//! | `{foo,bar}` | any of the comma separated alternatives  |
//! | `\x`        | the character `x` literally              |
//!
//! Everything else matches itself, including `,` and `}` outside of an
//! alternation. Patterns are translated into an anchored
//! [`regex::Regex`], so matching is linear in the candidate length.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;

/// Why a pattern failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternErrorKind {
    #[error("unclosed character class")]
    UnclosedClass,
    #[error("empty character class")]
    EmptyClass,
    #[error("invalid character range {start:?}-{end:?}")]
    InvalidRange { start: char, end: char },
    #[error("unclosed alternation")]
    UnclosedAlternation,
    #[error("pattern ends with an escape character")]
    TrailingEscape,
    #[error("{0}")]
    Compile(String),
}

/// A glob pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern {pattern:?}: {kind}")]
pub struct PatternError {
    /// The pattern as supplied by the caller.
    pub pattern: String,
    /// What was wrong with it.
    pub kind: PatternErrorKind,
}

impl PatternError {
    fn new(pattern: &str, kind: PatternErrorKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }
}

/// A compiled glob pattern.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for malformed syntax: an unclosed `[` or `{`,
    /// an empty or reversed character class, or a trailing `\`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let translated =
            translate(pattern).map_err(|kind| PatternError::new(pattern, kind))?;
        tracing::trace!(pattern, regex = %translated, "compiled glob");

        let regex = Regex::new(&translated).map_err(|e| {
            PatternError::new(pattern, PatternErrorKind::Compile(e.to_string()))
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compiles every pattern in `patterns`, failing on the first bad one.
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] of the first pattern that fails.
    pub fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>, PatternError> {
        patterns.iter().map(|p| Self::compile(p.as_ref())).collect()
    }

    /// Returns `true` if the whole of `candidate` matches.
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The original glob text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobPattern").field(&self.source).finish()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Returns `true` if `value` matches every pattern in `include` and none in
/// `exclude`.
#[must_use]
pub fn matches_all(value: &str, include: &[GlobPattern], exclude: &[GlobPattern]) -> bool {
    include.iter().all(|p| p.is_match(value)) && !exclude.iter().any(|p| p.is_match(value))
}

/// Translates a glob into an anchored regex source string.
fn translate(pattern: &str) -> Result<String, PatternErrorKind> {
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?s)^");

    let mut chars = pattern.chars().peekable();
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let escaped = chars.next().ok_or(PatternErrorKind::TrailingEscape)?;
                push_literal(&mut out, escaped);
            }
            '[' => translate_class(&mut chars, &mut out)?,
            '{' => {
                depth += 1;
                out.push_str("(?:");
            }
            '}' if depth > 0 => {
                depth -= 1;
                out.push(')');
            }
            ',' if depth > 0 => out.push('|'),
            other => push_literal(&mut out, other),
        }
    }

    if depth > 0 {
        return Err(PatternErrorKind::UnclosedAlternation);
    }

    out.push('$');
    Ok(out)
}

/// Translates a character class. The opening `[` is already consumed.
fn translate_class(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), PatternErrorKind> {
    out.push('[');
    if chars.peek() == Some(&'!') {
        chars.next();
        out.push('^');
    }

    let mut empty = true;
    loop {
        let c = chars.next().ok_or(PatternErrorKind::UnclosedClass)?;
        let start = match c {
            ']' if empty => return Err(PatternErrorKind::EmptyClass),
            ']' => break,
            '\\' => chars.next().ok_or(PatternErrorKind::TrailingEscape)?,
            other => other,
        };
        empty = false;

        if chars.peek() != Some(&'-') {
            push_class_char(out, start);
            continue;
        }
        chars.next();

        let end = match chars.next().ok_or(PatternErrorKind::UnclosedClass)? {
            // `[a-]` means 'a' or '-'.
            ']' => {
                push_class_char(out, start);
                push_class_char(out, '-');
                break;
            }
            '\\' => chars.next().ok_or(PatternErrorKind::TrailingEscape)?,
            other => other,
        };
        if end < start {
            return Err(PatternErrorKind::InvalidRange { start, end });
        }
        push_class_char(out, start);
        out.push('-');
        push_class_char(out, end);
    }

    out.push(']');
    Ok(())
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

fn push_class_char(out: &mut String, c: char) {
    use std::fmt::Write;
    // Hex escapes are valid for every code point inside a regex class.
    let _ = write!(out, "\\x{{{:x}}}", u32::from(c));
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::compile(p).unwrap()
    }

    #[test]
    fn star_matches_any_run() {
        let p = glob("*test*");
        assert!(p.is_match("test"));
        assert!(p.is_match("testing"));
        assert!(p.is_match("a test here"));
        assert!(!p.is_match("tes"));
        assert!(glob("*").is_match(""));
    }

    #[test]
    fn question_matches_exactly_one() {
        let p = glob("t?st");
        assert!(p.is_match("test"));
        assert!(p.is_match("tost"));
        assert!(!p.is_match("tst"));
        assert!(!p.is_match("teest"));
        assert!(glob("?").is_match("é"));
    }

    #[test]
    fn patterns_are_anchored() {
        let p = glob("t*");
        assert!(p.is_match("tester"));
        assert!(!p.is_match("attest"));
        assert!(!glob("*er").is_match("testers"));
        assert!(glob("").is_match(""));
        assert!(!glob("").is_match("x"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = glob("a.b+c(d)|e^$");
        assert!(p.is_match("a.b+c(d)|e^$"));
        assert!(!p.is_match("axb+c(d)|e^$"));
    }

    #[test]
    fn star_crosses_newlines() {
        assert!(glob("a*b").is_match("a\nb"));
    }

    #[test]
    fn character_classes() {
        let p = glob("[abc]x");
        assert!(p.is_match("ax"));
        assert!(p.is_match("cx"));
        assert!(!p.is_match("dx"));

        let r = glob("v[0-9]");
        assert!(r.is_match("v7"));
        assert!(!r.is_match("vx"));

        let n = glob("[!a-c]*");
        assert!(n.is_match("dog"));
        assert!(!n.is_match("cat"));
    }

    #[test]
    fn class_trailing_dash_is_literal() {
        let p = glob("[a-]");
        assert!(p.is_match("a"));
        assert!(p.is_match("-"));
        assert!(!p.is_match("b"));
    }

    #[test]
    fn class_special_characters_are_literal() {
        let p = glob(r"[\]^&~]");
        assert!(p.is_match("]"));
        assert!(p.is_match("^"));
        assert!(p.is_match("&"));
        assert!(p.is_match("~"));
        assert!(!p.is_match("a"));
    }

    #[test]
    fn alternation() {
        let p = glob("{foo,bar}-*");
        assert!(p.is_match("foo-1"));
        assert!(p.is_match("bar-2"));
        assert!(!p.is_match("baz-3"));

        let nested = glob("x{a,b{1,2}}");
        assert!(nested.is_match("xa"));
        assert!(nested.is_match("xb2"));
        assert!(!nested.is_match("xb3"));
    }

    #[test]
    fn comma_outside_alternation_is_literal() {
        assert!(glob("a,b").is_match("a,b"));
    }

    #[test]
    fn close_brace_outside_alternation_is_literal() {
        assert!(glob("a}").is_match("a}"));
        assert!(!glob("a}").is_match("a"));

        let p = glob("price}*");
        assert!(p.is_match("price}"));
        assert!(p.is_match("price}42"));
        assert!(!p.is_match("price42"));

        assert!(glob("{a,b}}").is_match("b}"));
    }

    #[test]
    fn escapes() {
        let p = glob(r"\*literal\?");
        assert!(p.is_match("*literal?"));
        assert!(!p.is_match("xliteral?"));
        assert!(glob(r"\{x\}").is_match("{x}"));
    }

    #[test]
    fn malformed_patterns_fail() {
        let cases = [
            ("[abc", PatternErrorKind::UnclosedClass),
            ("[]", PatternErrorKind::EmptyClass),
            ("[z-a]", PatternErrorKind::InvalidRange { start: 'z', end: 'a' }),
            ("{a,b", PatternErrorKind::UnclosedAlternation),
            ("abc\\", PatternErrorKind::TrailingEscape),
        ];
        for (pattern, kind) in cases {
            let err = GlobPattern::compile(pattern).unwrap_err();
            assert_eq!(err.pattern, pattern);
            assert_eq!(err.kind, kind, "pattern {pattern:?}");
        }
    }

    #[test]
    fn error_message_names_pattern() {
        let err = GlobPattern::compile("[x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid pattern \"[x\": unclosed character class"
        );
    }

    #[test]
    fn compile_all_reports_first_failure() {
        let err = GlobPattern::compile_all(&["ok*", "{bad", "[worse"]).unwrap_err();
        assert_eq!(err.pattern, "{bad");

        let ok = GlobPattern::compile_all(&["*est*", "t*"]).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].as_str(), "t*");
    }

    #[test]
    fn matches_all_includes_and_excludes() {
        let include = GlobPattern::compile_all(&["*est*", "t*"]).unwrap();
        let exclude = GlobPattern::compile_all(&["*er"]).unwrap();
        assert!(matches_all("test", &include, &exclude));
        assert!(matches_all("testing", &include, &exclude));
        assert!(!matches_all("tester", &include, &exclude));
        assert!(!matches_all("other", &include, &exclude));
        assert!(matches_all("anything", &[], &[]));
    }

    proptest! {
        #[test]
        fn escaped_literal_matches_itself(s in "\\PC{0,24}") {
            let mut pattern = String::new();
            for c in s.chars() {
                pattern.push('\\');
                pattern.push(c);
            }
            let p = GlobPattern::compile(&pattern).unwrap();
            prop_assert!(p.is_match(&s));
        }

        #[test]
        fn prefix_star_matches_any_suffix(prefix in "[a-z]{0,8}", suffix in "\\PC{0,16}") {
            let p = GlobPattern::compile(&format!("{prefix}*")).unwrap();
            let candidate = format!("{prefix}{suffix}");
            prop_assert!(p.is_match(&candidate));
        }
    }
}

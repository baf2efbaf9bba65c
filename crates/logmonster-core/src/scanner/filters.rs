//! Exclude filters applied to entry base names during the walk.
//!
//! Patterns use shell glob syntax (`*`, `?`, `[abc]`, `[!abc]`, `\x`) and
//! are matched against the whole base name, never the full path. Each glob
//! is translated into an anchored regex and all of them are evaluated in one
//! pass through a `RegexSet`.

use crate::error::ScanError;
use regex::RegexSet;

/// Compiled set of exclude globs.
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    patterns: Vec<String>,
    set: RegexSet,
}

impl ExcludeFilter {
    /// Compile the given glob patterns.
    ///
    /// Fails on the first pattern that does not translate into a valid
    /// regex (e.g. an unterminated `[` class).
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        let mut translated = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let re = glob_to_regex(pattern);
            // Validate individually so the error names the offending glob.
            regex::Regex::new(&re).map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            translated.push(re);
        }
        let set = RegexSet::new(&translated).map_err(|source| ScanError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set,
        })
    }

    /// A filter that excludes nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// `true` if `name` matches any exclude pattern.
    #[inline]
    pub fn is_excluded(&self, name: &str) -> bool {
        !self.patterns.is_empty() && self.set.is_match(name)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ExcludeFilter {
    fn default() -> Self {
        Self::empty()
    }
}

/// Translate one shell glob into an anchored regex source string.
///
/// Wildcards never match `/`. Inside a class, `!` or `^` in first position
/// negates it and a backslash escapes the next character.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                while let Some(cc) = chars.next() {
                    match cc {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push('\\');
                                out.push(escaped);
                            }
                        }
                        '-' => out.push('-'),
                        '[' | '&' | '~' => {
                            out.push('\\');
                            out.push(cc);
                        }
                        other => out.push(other),
                    }
                }
                if closed {
                    out.push(']');
                }
                // An unterminated class is left open so regex compilation
                // rejects the pattern.
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

//! Find/replace computation for remote URLs.
//!
//! A [`RewriteSpec`] is validated once per run and then applied to every
//! origin and submodule URL. [`RewriteSpec::apply`] returns `None` whenever
//! the URL should be left alone, whether because nothing matched or because
//! the substitution produced the same text.

use crate::error::InputError;
use regex::Regex;

/// How `find` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `find` is a plain substring.
    Literal,
    /// `find` is a regular expression and `replace` may hold `\1`-style
    /// backreferences.
    Regex,
}

impl MatchMode {
    /// Maps the `--regex` flag to a mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_origin_rewrite::rewrite::MatchMode;
    ///
    /// assert_eq!(MatchMode::from_flag(true), MatchMode::Regex);
    /// assert_eq!(MatchMode::from_flag(false), MatchMode::Literal);
    /// ```
    pub fn from_flag(regex: bool) -> Self {
        if regex {
            MatchMode::Regex
        } else {
            MatchMode::Literal
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal,
    Regex(Regex),
}

/// A validated find/replace pair.
#[derive(Debug, Clone)]
pub struct RewriteSpec {
    find: String,
    replace: String,
    /// `replace` in the form handed to the matcher. For regex mode this is
    /// the translated `regex` replacement syntax.
    replacement: String,
    matcher: Matcher,
}

impl RewriteSpec {
    /// Validates `find` and, in regex mode, compiles it and checks every
    /// group reference in `replace` against the compiled pattern.
    ///
    /// # Parameters
    ///
    /// * `find` – Text or pattern to look for. Must be non-blank.
    /// * `replace` – Substitution. In regex mode `\N`, `\NN`, `\g<N>` and
    ///   `\g<name>` refer to capture groups.
    /// * `mode` – Literal or regex matching.
    ///
    /// # Errors
    ///
    /// * [`InputError::EmptyFind`] if `find` is empty after trimming.
    /// * [`InputError::InvalidRegex`] if regex mode is requested and `find`
    ///   does not compile.
    /// * [`InputError::InvalidReplacement`] if `replace` refers to a group
    ///   the pattern does not define, or uses the octal escape `\0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_origin_rewrite::rewrite::{MatchMode, RewriteSpec};
    ///
    /// let spec = RewriteSpec::new(r"server-(\d+)", r"host-\1", MatchMode::Regex).unwrap();
    /// assert_eq!(spec.apply("ssh://server-42/x").as_deref(), Some("ssh://host-42/x"));
    ///
    /// assert!(RewriteSpec::new(r"server-(\d+)", r"host-\2", MatchMode::Regex).is_err());
    /// ```
    pub fn new(find: &str, replace: &str, mode: MatchMode) -> Result<Self, InputError> {
        if find.trim().is_empty() {
            return Err(InputError::EmptyFind);
        }

        let (matcher, replacement) = match mode {
            MatchMode::Literal => (Matcher::Literal, replace.to_string()),
            MatchMode::Regex => {
                let re = Regex::new(find)?;
                let replacement = translate_replacement(replace, &re)?;
                (Matcher::Regex(re), replacement)
            }
        };

        Ok(RewriteSpec {
            find: find.to_string(),
            replace: replace.to_string(),
            replacement,
            matcher,
        })
    }

    /// The find text as given, before any trailing-slash fallback.
    pub fn find(&self) -> &str {
        &self.find
    }

    /// The replacement as given, before backreference translation.
    pub fn replace(&self) -> &str {
        &self.replace
    }

    /// How `find` is interpreted; shown in the banner.
    pub fn mode(&self) -> MatchMode {
        match self.matcher {
            Matcher::Literal => MatchMode::Literal,
            Matcher::Regex(_) => MatchMode::Regex,
        }
    }

    /// Shorthand for `mode() == MatchMode::Regex`.
    pub fn is_regex(&self) -> bool {
        self.mode() == MatchMode::Regex
    }

    /// Whether `find` matches anywhere in `current`, including the
    /// trailing-slash fallback in literal mode.
    pub fn matches(&self, current: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(current),
            Matcher::Literal => self.effective_literal(current).is_some(),
        }
    }

    /// Computes the rewritten form of `current`.
    ///
    /// Returns `None` when `find` does not match or when the result is
    /// identical to `current`.
    pub fn apply(&self, current: &str) -> Option<String> {
        let rewritten = match &self.matcher {
            Matcher::Regex(re) => {
                if !re.is_match(current) {
                    return None;
                }
                re.replace_all(current, self.replacement.as_str())
                    .into_owned()
            }
            Matcher::Literal => {
                let pattern = self.effective_literal(current)?;
                if pattern != self.find {
                    tracing::info!(find = %self.find, matched = pattern, "matched stripped version");
                }
                current.replace(pattern, &self.replacement)
            }
        };

        if rewritten == current {
            None
        } else {
            Some(rewritten)
        }
    }

    /// Picks the literal pattern to substitute in `current`.
    ///
    /// Users often type `org/repo/` for a URL that ends in `org/repo`, so
    /// when `find` ends in `/` and does not occur verbatim, the form without
    /// trailing slashes is tried. A `find` made only of slashes never falls
    /// back to the empty string.
    fn effective_literal<'a>(&'a self, current: &str) -> Option<&'a str> {
        if current.contains(self.find.as_str()) {
            return Some(self.find.as_str());
        }

        if self.find.ends_with('/') {
            let stripped = self.find.trim_end_matches('/');
            if !stripped.is_empty() && current.contains(stripped) {
                return Some(stripped);
            }
        }

        None
    }
}

/// Computes the new URL for `current` in one call.
///
/// `Ok(None)` means "no change". Building a [`RewriteSpec`] once and calling
/// [`RewriteSpec::apply`] is preferred when rewriting many URLs.
pub fn compute_new_url(
    current: &str,
    find: &str,
    replace: &str,
    is_regex: bool,
) -> Result<Option<String>, InputError> {
    let spec = RewriteSpec::new(find, replace, MatchMode::from_flag(is_regex))?;
    Ok(spec.apply(current))
}

/// Converts a backslash-style replacement (`\1`, `\g<name>`) into the
/// `$`-style syntax understood by [`Regex::replace_all`].
///
/// * `\N` and `\NN` refer to numbered groups.
/// * `\g<name>` and `\g<N>` refer to named or numbered groups; `\g<0>` is
///   the whole match.
/// * `\\`, `\n`, `\t` and `\r` are the usual escapes.
/// * A literal `$` stays literal.
/// * Any other backslash sequence is kept verbatim.
///
/// # Errors
///
/// Returns [`InputError::InvalidReplacement`] when a reference names a
/// group `re` does not have, or for `\0`, which is an octal escape rather
/// than a group reference.
pub(crate) fn translate_replacement(replace: &str, re: &Regex) -> Result<String, InputError> {
    let mut out = String::with_capacity(replace.len());
    let mut rest = replace;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];

        match c {
            '$' => out.push_str("$$"),
            '\\' => {
                if rest.starts_with('0') {
                    return Err(InputError::InvalidReplacement(String::from(
                        "octal escape \\0 is not a group reference",
                    )));
                }

                let digits = rest.bytes().take(2).take_while(u8::is_ascii_digit).count();
                if digits > 0 {
                    let group = &rest[..digits];
                    check_group(group, re)?;
                    out.push_str(&format!("${{{}}}", group));
                    rest = &rest[digits..];
                    continue;
                }

                if let Some((name, consumed)) = group_reference(rest) {
                    check_group(name, re)?;
                    out.push_str(&format!("${{{}}}", name));
                    rest = &rest[consumed..];
                    continue;
                }

                match rest.chars().next() {
                    Some(next) => {
                        match next {
                            '\\' => out.push('\\'),
                            'n' => out.push('\n'),
                            't' => out.push('\t'),
                            'r' => out.push('\r'),
                            other => {
                                out.push('\\');
                                out.push(other);
                            }
                        }
                        rest = &rest[next.len_utf8()..];
                    }
                    None => out.push('\\'),
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Fails unless `group` (a number or a name) exists in `re`.
fn check_group(group: &str, re: &Regex) -> Result<(), InputError> {
    let known = match group.parse::<usize>() {
        Ok(index) => index < re.captures_len(),
        Err(_) => re.capture_names().flatten().any(|name| name == group),
    };

    if known {
        Ok(())
    } else {
        Err(InputError::InvalidReplacement(format!(
            "invalid group reference {}",
            group
        )))
    }
}

/// Parses `g<name>` at the start of `s`, returning the name and the number
/// of bytes consumed.
fn group_reference(s: &str) -> Option<(&str, usize)> {
    let body = s.strip_prefix("g<")?;
    let end = body.find('>')?;
    let name = &body[..end];

    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Some((name, 2 + end + 1))
    } else {
        None
    }
}

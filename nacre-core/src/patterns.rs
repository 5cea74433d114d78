//! Shell patterns.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::error;

/// Represents a piece of a shell pattern.
#[derive(Clone, Debug)]
pub(crate) enum PatternPiece {
    /// A pattern that should be interpreted as a shell pattern.
    Pattern(String),
    /// A literal string that should be matched exactly.
    Literal(String),
}

impl PatternPiece {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pattern(s) => s,
            Self::Literal(s) => s,
        }
    }
}

type PatternWord = Vec<PatternPiece>;

/// Encapsulates a shell pattern.
#[derive(Clone, Debug, Default)]
pub struct Pattern {
    pieces: PatternWord,
    case_insensitive: bool,
}

impl From<PatternWord> for Pattern {
    fn from(pieces: PatternWord) -> Self {
        Self {
            pieces,
            ..Default::default()
        }
    }
}

impl From<&PatternWord> for Pattern {
    fn from(value: &PatternWord) -> Self {
        Self {
            pieces: value.clone(),
            ..Default::default()
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self {
            pieces: vec![PatternPiece::Pattern(value.to_owned())],
            ..Default::default()
        }
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self {
            pieces: vec![PatternPiece::Pattern(value)],
            ..Default::default()
        }
    }
}

impl Pattern {
    /// Enables (or disables) case-insensitive matching for this pattern.
    ///
    /// # Arguments
    ///
    /// * `value` - Whether or not to enable case-insensitive matching.
    #[must_use]
    pub const fn set_case_insensitive(mut self, value: bool) -> Self {
        self.case_insensitive = value;
        self
    }

    /// Returns whether or not the pattern is empty.
    pub fn is_empty(&self) -> bool {
        self.pieces.iter().all(|p| p.as_str().is_empty())
    }

    /// Expands the pattern into a list of matching file paths, sorted. Returns
    /// an empty list if nothing matched; the caller decides whether to keep the
    /// pattern literal in that case.
    ///
    /// # Arguments
    ///
    /// * `working_dir` - The current working directory, used for relative paths.
    pub(crate) fn expand(&self, working_dir: &Path) -> Result<Vec<String>, error::Error> {
        if self.is_empty() {
            return Ok(vec![]);
        }

        // If the pattern requires no expansion, there's a single result.
        if !self.pieces.iter().any(|piece| {
            matches!(piece, PatternPiece::Pattern(_)) && requires_expansion(piece.as_str())
        }) {
            let concatenated: String = self.pieces.iter().map(|piece| piece.as_str()).collect();
            return Ok(vec![concatenated]);
        }

        tracing::debug!(target: "pattern", "expanding pattern: {self:?}");

        // Split the pattern on path separators, preserving each piece's
        // pattern-vs-literal provenance.
        let mut components: Vec<PatternWord> = vec![];
        for piece in &self.pieces {
            let mut split_result = piece
                .as_str()
                .split(std::path::MAIN_SEPARATOR)
                .map(|s| match piece {
                    PatternPiece::Pattern(_) => PatternPiece::Pattern(s.to_owned()),
                    PatternPiece::Literal(_) => PatternPiece::Literal(s.to_owned()),
                })
                .collect::<VecDeque<_>>();

            if let Some(first_piece) = split_result.pop_front() {
                if let Some(last_component) = components.last_mut() {
                    last_component.push(first_piece);
                } else {
                    components.push(vec![first_piece]);
                }
            }

            while let Some(piece) = split_result.pop_front() {
                components.push(vec![piece]);
            }
        }

        // Check if the path appears to be absolute.
        let is_absolute = components
            .first()
            .is_some_and(|first| first.iter().all(|piece| piece.as_str().is_empty()));

        let prefix_to_remove;
        let mut paths_so_far = if is_absolute {
            prefix_to_remove = None;
            vec![PathBuf::from(std::path::MAIN_SEPARATOR_STR)]
        } else {
            let mut working_dir_str = working_dir.to_string_lossy().to_string();

            if !working_dir_str.ends_with(std::path::MAIN_SEPARATOR) {
                working_dir_str.push(std::path::MAIN_SEPARATOR);
            }

            prefix_to_remove = Some(working_dir_str);
            vec![working_dir.to_path_buf()]
        };

        for component in components {
            if !component.iter().any(|piece| {
                matches!(piece, PatternPiece::Pattern(_)) && requires_expansion(piece.as_str())
            }) {
                let flattened = component
                    .iter()
                    .map(|piece| piece.as_str())
                    .collect::<String>();
                for p in &mut paths_so_far {
                    p.push(&flattened);
                }
                continue;
            }

            let current_paths = std::mem::take(&mut paths_so_far);
            for current_path in current_paths {
                let subpattern =
                    Self::from(&component).set_case_insensitive(self.case_insensitive);

                // An explicit leading dot is required to match dot files.
                let subpattern_starts_with_dot = subpattern
                    .pieces
                    .first()
                    .is_some_and(|piece| piece.as_str().starts_with('.'));

                let matches_dotfile_policy = |dir_entry: &std::fs::DirEntry| {
                    subpattern_starts_with_dot
                        || !dir_entry.file_name().to_string_lossy().starts_with('.')
                };

                let regex = subpattern.to_regex(true, true)?;
                let matches_regex = |dir_entry: &std::fs::DirEntry| {
                    regex
                        .is_match(dir_entry.file_name().to_string_lossy().as_ref())
                        .unwrap_or(false)
                };

                let mut matching_paths_in_dir: Vec<_> = current_path
                    .read_dir()
                    .map_or_else(|_| vec![], |dir| dir.into_iter().collect())
                    .into_iter()
                    .filter_map(|result| result.ok())
                    .filter(matches_regex)
                    .filter(matches_dotfile_policy)
                    .map(|entry| entry.path())
                    .collect();

                matching_paths_in_dir.sort();

                paths_so_far.append(&mut matching_paths_in_dir);
            }
        }

        let results: Vec<_> = paths_so_far
            .into_iter()
            .map(|path| {
                let path_str = path.to_string_lossy();
                let mut path_ref = path_str.as_ref();

                if let Some(prefix_to_remove) = &prefix_to_remove {
                    path_ref = path_ref.strip_prefix(prefix_to_remove).unwrap_or(path_ref);
                }

                path_ref.to_string()
            })
            .collect();

        tracing::debug!(target: "pattern", "  => results: {results:?}");

        Ok(results)
    }

    /// Converts the pattern to a regular expression string.
    ///
    /// # Arguments
    ///
    /// * `strict_prefix_match` - Whether the pattern must match the start of the string.
    /// * `strict_suffix_match` - Whether the pattern must match the end of the string.
    pub(crate) fn to_regex_str(
        &self,
        strict_prefix_match: bool,
        strict_suffix_match: bool,
    ) -> Result<String, error::Error> {
        let mut regex_str = String::new();

        // Make '.' match newlines too; case values may span lines.
        regex_str.push_str("(?s)");

        if strict_prefix_match {
            regex_str.push('^');
        }

        let mut current_pattern = String::new();
        for piece in &self.pieces {
            match piece {
                PatternPiece::Pattern(s) => {
                    current_pattern.push_str(s);
                }
                PatternPiece::Literal(s) => {
                    for c in s.chars() {
                        current_pattern.push('\\');
                        current_pattern.push(c);
                    }
                }
            }
        }

        let regex_piece = pattern_to_regex_str(current_pattern.as_str())?;
        regex_str.push_str(regex_piece.as_str());

        if strict_suffix_match {
            regex_str.push('$');
        }

        Ok(regex_str)
    }

    /// Converts the pattern to a regular expression.
    ///
    /// # Arguments
    ///
    /// * `strict_prefix_match` - Whether the pattern must match the start of the string.
    /// * `strict_suffix_match` - Whether the pattern must match the end of the string.
    pub(crate) fn to_regex(
        &self,
        strict_prefix_match: bool,
        strict_suffix_match: bool,
    ) -> Result<fancy_regex::Regex, error::Error> {
        let regex_str = self.to_regex_str(strict_prefix_match, strict_suffix_match)?;

        tracing::debug!(target: "pattern", "pattern: '{self:?}' => regex: '{regex_str}'");

        let re = fancy_regex::RegexBuilder::new(regex_str.as_str())
            .case_insensitive(self.case_insensitive)
            .build()?;

        Ok(re)
    }

    /// Checks if the pattern exactly matches the given string.
    ///
    /// # Arguments
    ///
    /// * `value` - The string to check for a match.
    pub fn exactly_matches(&self, value: &str) -> Result<bool, error::Error> {
        let re = self.to_regex(true, true)?;
        Ok(re.is_match(value)?)
    }
}

fn requires_expansion(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Translates a POSIX shell pattern into a regular expression string.
fn pattern_to_regex_str(pattern: &str) -> Result<String, error::Error> {
    let mut regex_str = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal_char(&mut regex_str, escaped);
                } else {
                    return Err(error::Error::InvalidPattern(pattern.to_owned()));
                }
            }
            '[' => {
                // Collect the bracket expression; if it turns out to be
                // unterminated, treat the '[' literally.
                let mut class_chars = vec![];
                let mut closed = false;

                // A leading ']' (possibly after negation) is a literal member.
                let mut allow_literal_bracket = true;
                if matches!(chars.peek(), Some('!' | '^')) {
                    class_chars.push('^');
                    chars.next();
                }

                for candidate in chars.by_ref() {
                    if candidate == ']' && !allow_literal_bracket {
                        closed = true;
                        break;
                    }

                    allow_literal_bracket = false;
                    class_chars.push(candidate);
                }

                if closed {
                    regex_str.push('[');
                    for class_char in class_chars {
                        if matches!(class_char, '[' | ']' | '\\') {
                            regex_str.push('\\');
                        }
                        regex_str.push(class_char);
                    }
                    regex_str.push(']');
                } else {
                    push_literal_char(&mut regex_str, '[');
                    for class_char in class_chars {
                        push_literal_char(&mut regex_str, class_char);
                    }
                }
            }
            c => push_literal_char(&mut regex_str, c),
        }
    }

    Ok(regex_str)
}

fn push_literal_char(regex_str: &mut String, c: char) {
    if c.is_ascii() && !c.is_ascii_alphanumeric() {
        regex_str.push('\\');
    }
    regex_str.push(c);
}

/// Removes the largest matching prefix from a string that matches the given pattern.
///
/// # Arguments
///
/// * `s` - The string to remove the prefix from.
/// * `pattern` - The pattern to match.
pub(crate) fn remove_largest_matching_prefix<'a>(
    s: &'a str,
    pattern: &Option<Pattern>,
) -> Result<&'a str, error::Error> {
    if let Some(pattern) = pattern {
        let indices = s.char_indices().rev();
        let mut last_idx = s.len();

        for (idx, _) in indices {
            let prefix = &s[0..last_idx];
            if pattern.exactly_matches(prefix)? {
                return Ok(&s[last_idx..]);
            }

            last_idx = idx;
        }
    }
    Ok(s)
}

/// Removes the smallest matching prefix from a string that matches the given pattern.
///
/// # Arguments
///
/// * `s` - The string to remove the prefix from.
/// * `pattern` - The pattern to match.
pub(crate) fn remove_smallest_matching_prefix<'a>(
    s: &'a str,
    pattern: &Option<Pattern>,
) -> Result<&'a str, error::Error> {
    if let Some(pattern) = pattern {
        for (idx, c) in s.char_indices() {
            let next_index = idx + c.len_utf8();
            let prefix = &s[0..next_index];
            if pattern.exactly_matches(prefix)? {
                return Ok(&s[next_index..]);
            }
        }
    }
    Ok(s)
}

/// Removes the largest matching suffix from a string that matches the given pattern.
///
/// # Arguments
///
/// * `s` - The string to remove the suffix from.
/// * `pattern` - The pattern to match.
pub(crate) fn remove_largest_matching_suffix<'a>(
    s: &'a str,
    pattern: &Option<Pattern>,
) -> Result<&'a str, error::Error> {
    if let Some(pattern) = pattern {
        for (idx, _) in s.char_indices() {
            let suffix = &s[idx..];
            if pattern.exactly_matches(suffix)? {
                return Ok(&s[..idx]);
            }
        }
    }
    Ok(s)
}

/// Removes the smallest matching suffix from a string that matches the given pattern.
///
/// # Arguments
///
/// * `s` - The string to remove the suffix from.
/// * `pattern` - The pattern to match.
pub(crate) fn remove_smallest_matching_suffix<'a>(
    s: &'a str,
    pattern: &Option<Pattern>,
) -> Result<&'a str, error::Error> {
    if let Some(pattern) = pattern {
        for (idx, _) in s.char_indices().rev() {
            let suffix = &s[idx..];
            if pattern.exactly_matches(suffix)? {
                return Ok(&s[..idx]);
            }
        }
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn star_matches_any_sequence() -> Result<()> {
        let pattern = Pattern::from("a*c");
        assert!(pattern.exactly_matches("ac")?);
        assert!(pattern.exactly_matches("abc")?);
        assert!(pattern.exactly_matches("a/b/c")?);
        assert!(!pattern.exactly_matches("ab")?);
        Ok(())
    }

    #[test]
    fn question_mark_matches_single_char() -> Result<()> {
        let pattern = Pattern::from("a?c");
        assert!(pattern.exactly_matches("abc")?);
        assert!(!pattern.exactly_matches("ac")?);
        assert!(!pattern.exactly_matches("abbc")?);
        Ok(())
    }

    #[test]
    fn bracket_expression_matches_class() -> Result<()> {
        let pattern = Pattern::from("[abc]x");
        assert!(pattern.exactly_matches("ax")?);
        assert!(!pattern.exactly_matches("dx")?);

        let negated = Pattern::from("[!abc]x");
        assert!(negated.exactly_matches("dx")?);
        assert!(!negated.exactly_matches("ax")?);

        let range = Pattern::from("[0-9][0-9]");
        assert!(range.exactly_matches("42")?);
        assert!(!range.exactly_matches("4x")?);
        Ok(())
    }

    #[test]
    fn literal_pieces_are_not_interpreted() -> Result<()> {
        let pattern = Pattern::from(vec![
            PatternPiece::Literal("*".to_owned()),
            PatternPiece::Pattern("*".to_owned()),
        ]);
        assert!(pattern.exactly_matches("*anything")?);
        assert!(!pattern.exactly_matches("xanything")?);
        Ok(())
    }

    #[test]
    fn regex_special_chars_are_escaped() -> Result<()> {
        let pattern = Pattern::from("a.c");
        assert!(pattern.exactly_matches("a.c")?);
        assert!(!pattern.exactly_matches("abc")?);

        let pattern = Pattern::from("a+b");
        assert!(pattern.exactly_matches("a+b")?);
        Ok(())
    }

    #[test]
    fn unterminated_bracket_is_literal() -> Result<()> {
        let pattern = Pattern::from("a[b");
        assert!(pattern.exactly_matches("a[b")?);
        Ok(())
    }

    #[test]
    fn prefix_and_suffix_removal() -> Result<()> {
        let pattern = Some(Pattern::from("*."));
        assert_eq!(
            remove_smallest_matching_prefix("a.b.c", &pattern)?,
            "b.c"
        );
        assert_eq!(remove_largest_matching_prefix("a.b.c", &pattern)?, "c");

        let pattern = Some(Pattern::from(".*"));
        assert_eq!(
            remove_smallest_matching_suffix("a.b.c", &pattern)?,
            "a.b"
        );
        assert_eq!(remove_largest_matching_suffix("a.b.c", &pattern)?, "a");
        Ok(())
    }

    #[test]
    fn expand_finds_matching_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("one.txt"), "")?;
        std::fs::write(dir.path().join("two.txt"), "")?;
        std::fs::write(dir.path().join("three.log"), "")?;
        std::fs::write(dir.path().join(".hidden.txt"), "")?;

        let pattern = Pattern::from("*.txt");
        let mut results = pattern.expand(dir.path())?;
        results.sort();
        assert_eq!(results, ["one.txt", "two.txt"]);

        let pattern = Pattern::from("*.missing");
        assert!(pattern.expand(dir.path())?.is_empty());
        Ok(())
    }
}

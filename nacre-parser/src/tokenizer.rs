//! Breaks shell script text into operator and word tokens.

use std::borrow::Cow;
use std::fmt::Display;
use utf8_chars::BufReadCharsExt;

/// A position in the source input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Byte index from the start of the input.
    pub index: i32,
    /// 1-based line number.
    pub line: i32,
    /// 1-based column number.
    pub column: i32,
}

impl Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The extent of a token in the source input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenLocation {
    /// The start of the token.
    pub start: SourcePosition,
    /// The position just past the end of the token.
    pub end: SourcePosition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenEndReason {
    /// End of input was reached.
    EndOfInput,
    /// An unescaped newline char was reached.
    UnescapedNewLine,
    /// Specified terminating char.
    SpecifiedTerminatingChar,
    /// A non-newline blank char was reached.
    NonNewLineBlank,
    /// A here-document's body is starting.
    HereDocumentBodyStart,
    /// A here-document's body was terminated.
    HereDocumentBodyEnd,
    /// A here-document's end tag was reached.
    HereDocumentEndTag,
    /// An operator was started.
    OperatorStart,
    /// An operator was terminated.
    OperatorEnd,
    /// Some other condition was reached.
    Other,
}

/// Represents a token extracted from a shell script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// An operator token.
    Operator(String, TokenLocation),
    /// A word token.
    Word(String, TokenLocation),
}

impl Token {
    /// Returns the string value of the token.
    pub fn to_str(&self) -> &str {
        match self {
            Self::Operator(s, _) => s,
            Self::Word(s, _) => s,
        }
    }

    /// Returns the location of the token in the source script.
    pub const fn location(&self) -> &TokenLocation {
        match self {
            Self::Operator(_, l) => l,
            Self::Word(_, l) => l,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Encapsulates the result of extracting one token.
#[derive(Clone, Debug)]
pub(crate) struct TokenizeResult {
    /// Reason for tokenization ending.
    pub reason: TokenEndReason,
    /// The token that was extracted, if any.
    pub token: Option<Token>,
}

/// Represents an error that occurred during tokenization.
#[derive(thiserror::Error, Debug)]
pub enum TokenizerError {
    /// An unterminated escape sequence was encountered at the end of the input stream.
    #[error("unterminated escape sequence")]
    UnterminatedEscapeSequence,

    /// An unterminated single-quoted substring was encountered at the end of the input stream.
    #[error("unterminated single quote at {0}")]
    UnterminatedSingleQuote(SourcePosition),

    /// An unterminated double-quoted substring was encountered at the end of the input stream.
    #[error("unterminated double quote at {0}")]
    UnterminatedDoubleQuote(SourcePosition),

    /// An unterminated backquoted substring was encountered at the end of the input stream.
    #[error("unterminated backquote near {0}")]
    UnterminatedBackquote(SourcePosition),

    /// An unterminated variable expression was encountered at the end of the input stream.
    #[error("unterminated variable expression")]
    UnterminatedVariable,

    /// An unterminated command substitution was encountered at the end of the input stream.
    #[error("unterminated command substitution")]
    UnterminatedCommandSubstitution,

    /// An error occurred decoding UTF-8 characters in the input stream.
    #[error("failed to decode UTF-8 characters")]
    FailedDecoding,

    /// An I/O here tag was missing.
    #[error("missing here tag for here document body")]
    MissingHereTagForDocumentBody,

    /// The indicated I/O here tag was missing.
    #[error("missing here tag '{0}'")]
    MissingHereTag(String),

    /// An unterminated here-document was encountered at the end of the input stream.
    #[error("unterminated here document; tag(s) [{0}]")]
    UnterminatedHereDocuments(String),

    /// An I/O error occurred while reading from the input stream.
    #[error("failed to read input")]
    ReadError(#[from] std::io::Error),
}

impl TokenizerError {
    /// Returns true if the error could be resolved by reading more input.
    pub const fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::UnterminatedEscapeSequence
                | Self::UnterminatedSingleQuote(..)
                | Self::UnterminatedDoubleQuote(..)
                | Self::UnterminatedBackquote(..)
                | Self::UnterminatedCommandSubstitution
                | Self::UnterminatedVariable
                | Self::UnterminatedHereDocuments(..)
        )
    }
}

/// Encapsulates a sequence of tokens.
#[derive(Debug)]
pub(crate) struct Tokens<'a> {
    /// Sequence of tokens.
    pub tokens: &'a [Token],
}

#[derive(Clone, Debug)]
enum QuoteMode {
    None,
    Single(SourcePosition),
    Double(SourcePosition),
}

#[derive(Clone, Debug, Default)]
enum HereState {
    /// Not currently tracking any here-documents.
    #[default]
    None,
    /// The next token will be a here tag.
    NextTokenIsHereTag { remove_tabs: bool },
    /// The *current* token is a here tag.
    CurrentTokenIsHereTag {
        remove_tabs: bool,
        operator_token_result: TokenizeResult,
    },
    /// The *next line* will start the body of a here-document.
    NextLineIsHereDoc,
    /// Inside the lines comprising one or more here-document bodies.
    InHereDocs,
}

#[derive(Clone, Debug)]
struct HereTag {
    tag: String,
    tag_was_escaped_or_quoted: bool,
    remove_tabs: bool,
    tokens: Vec<TokenizeResult>,
    pending_tokens_after: Vec<TokenizeResult>,
}

#[derive(Clone, Debug)]
struct CrossTokenParseState {
    /// Cursor within the overall token stream; used for error reporting.
    cursor: SourcePosition,
    /// Current state of parsing here-documents.
    here_state: HereState,
    /// Ordered queue of here tags still awaiting matching here-document bodies.
    current_here_tags: Vec<HereTag>,
    /// Tokens already tokenized that should be used first to serve requests for tokens.
    queued_tokens: Vec<TokenizeResult>,
}

/// Options controlling how the tokenizer operates.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct TokenizerOptions {
    /// Whether or not to operate in POSIX compliance mode.
    pub posix_mode: bool,
}

/// A tokenizer for shell scripts.
pub struct Tokenizer<'a, R: ?Sized + std::io::BufRead> {
    char_reader: std::iter::Peekable<utf8_chars::Chars<'a, R>>,
    cross_state: CrossTokenParseState,
    #[allow(dead_code)]
    options: TokenizerOptions,
}

/// Encapsulates the current token parsing state.
#[derive(Clone, Debug)]
struct TokenParseState {
    pub start_position: SourcePosition,
    pub token_so_far: String,
    pub token_is_operator: bool,
    pub in_escape: bool,
    pub quote_mode: QuoteMode,
}

impl TokenParseState {
    pub fn new(start_position: &SourcePosition) -> Self {
        Self {
            start_position: start_position.clone(),
            token_so_far: String::new(),
            token_is_operator: false,
            in_escape: false,
            quote_mode: QuoteMode::None,
        }
    }

    pub fn pop(&mut self, end_position: &SourcePosition) -> Token {
        let token_location = TokenLocation {
            start: std::mem::take(&mut self.start_position),
            end: end_position.clone(),
        };

        let token = if std::mem::take(&mut self.token_is_operator) {
            Token::Operator(std::mem::take(&mut self.token_so_far), token_location)
        } else {
            Token::Word(std::mem::take(&mut self.token_so_far), token_location)
        };

        self.start_position = end_position.clone();
        self.in_escape = false;
        self.quote_mode = QuoteMode::None;

        token
    }

    pub const fn started_token(&self) -> bool {
        !self.token_so_far.is_empty()
    }

    pub fn append_char(&mut self, c: char) {
        self.token_so_far.push(c);
    }

    pub fn append_str(&mut self, s: &str) {
        self.token_so_far.push_str(s);
    }

    pub const fn unquoted(&self) -> bool {
        !self.in_escape && matches!(self.quote_mode, QuoteMode::None)
    }

    pub fn current_token(&self) -> &str {
        &self.token_so_far
    }

    pub fn is_specific_operator(&self, operator: &str) -> bool {
        self.token_is_operator && self.current_token() == operator
    }

    pub const fn in_operator(&self) -> bool {
        self.token_is_operator
    }

    fn is_newline(&self) -> bool {
        self.token_so_far == "\n"
    }

    fn replace_with_here_doc(&mut self, s: String) {
        self.token_so_far = s;
    }

    pub fn delimit_current_token(
        &mut self,
        reason: TokenEndReason,
        cross_token_state: &mut CrossTokenParseState,
    ) -> Result<Option<TokenizeResult>, TokenizerError> {
        // Don't yield an empty token unless it's the body of a here document.
        if !self.started_token() && !matches!(reason, TokenEndReason::HereDocumentBodyEnd) {
            return Ok(Some(TokenizeResult {
                reason,
                token: None,
            }));
        }

        let current_here_state = std::mem::take(&mut cross_token_state.here_state);
        match current_here_state {
            HereState::NextTokenIsHereTag { remove_tabs } => {
                // Hold the operator token back until we've collected everything needed
                // for all here-documents whose tags appear on this line.
                let operator_token_result = TokenizeResult {
                    reason,
                    token: Some(self.pop(&cross_token_state.cursor)),
                };

                cross_token_state.here_state = HereState::CurrentTokenIsHereTag {
                    remove_tabs,
                    operator_token_result,
                };

                return Ok(None);
            }
            HereState::CurrentTokenIsHereTag {
                remove_tabs,
                operator_token_result,
            } => {
                if self.is_newline() {
                    return Err(TokenizerError::MissingHereTag(
                        self.current_token().to_owned(),
                    ));
                }

                cross_token_state.here_state = HereState::NextLineIsHereDoc;

                // Include the trailing \n in the here tag so it's easier to check against.
                let tag = std::format!("{}\n", self.current_token().trim_start());
                let tag_was_escaped_or_quoted = tag.contains(is_quoting_char);

                let tag_token_result = TokenizeResult {
                    reason,
                    token: Some(self.pop(&cross_token_state.cursor)),
                };

                cross_token_state.current_here_tags.push(HereTag {
                    tag,
                    tag_was_escaped_or_quoted,
                    remove_tabs,
                    tokens: vec![operator_token_result, tag_token_result],
                    pending_tokens_after: vec![],
                });

                return Ok(None);
            }
            HereState::NextLineIsHereDoc => {
                if self.is_newline() {
                    cross_token_state.here_state = HereState::InHereDocs;
                } else {
                    cross_token_state.here_state = HereState::NextLineIsHereDoc;
                }

                if let Some(last_here_tag) = cross_token_state.current_here_tags.last_mut() {
                    let token = self.pop(&cross_token_state.cursor);
                    last_here_tag.pending_tokens_after.push(TokenizeResult {
                        reason,
                        token: Some(token),
                    });
                } else {
                    return Err(TokenizerError::MissingHereTagForDocumentBody);
                }

                return Ok(None);
            }
            HereState::InHereDocs => {
                // We hit the end of the current here-document.
                let completed_here_tag = cross_token_state.current_here_tags.remove(0);

                // First queue the redirection operator and (start) here-tag.
                for here_token in completed_here_tag.tokens {
                    cross_token_state.queued_tokens.push(here_token);
                }

                // Leave a hint that we are about to start a here-document.
                cross_token_state.queued_tokens.push(TokenizeResult {
                    reason: TokenEndReason::HereDocumentBodyStart,
                    token: None,
                });

                // Then queue the body document we just finished.
                cross_token_state.queued_tokens.push(TokenizeResult {
                    reason,
                    token: Some(self.pop(&cross_token_state.cursor)),
                });

                // Then queue up the (end) here-tag.
                self.append_str(completed_here_tag.tag.trim_end_matches('\n'));
                cross_token_state.queued_tokens.push(TokenizeResult {
                    reason: TokenEndReason::HereDocumentEndTag,
                    token: Some(self.pop(&cross_token_state.cursor)),
                });

                // Now queue up any tokens that came between the completed here tag and
                // the next here tag (or the newline after it if it was the last).
                for pending_token in completed_here_tag.pending_tokens_after {
                    cross_token_state.queued_tokens.push(pending_token);
                }

                if cross_token_state.current_here_tags.is_empty() {
                    cross_token_state.here_state = HereState::None;
                } else {
                    cross_token_state.here_state = HereState::InHereDocs;
                }

                return Ok(None);
            }
            HereState::None => (),
        }

        let token = self.pop(&cross_token_state.cursor);
        Ok(Some(TokenizeResult {
            reason,
            token: Some(token),
        }))
    }
}

/// Break the given input shell script string into tokens, returning the tokens.
///
/// # Arguments
///
/// * `input` - The shell script to tokenize.
pub fn tokenize_str(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let mut reader = std::io::BufReader::new(input.as_bytes());
    let mut tokenizer = Tokenizer::new(&mut reader, &TokenizerOptions::default());

    let mut tokens = vec![];
    loop {
        match tokenizer.next_token()? {
            TokenizeResult {
                token: Some(token), ..
            } => tokens.push(token),
            TokenizeResult {
                reason: TokenEndReason::EndOfInput,
                ..
            } => break,
            _ => (),
        }
    }

    Ok(tokens)
}

impl<'a, R: ?Sized + std::io::BufRead> Tokenizer<'a, R> {
    /// Returns a new tokenizer over the given reader.
    pub fn new(reader: &'a mut R, options: &TokenizerOptions) -> Self {
        Tokenizer {
            options: options.clone(),
            char_reader: reader.chars().peekable(),
            cross_state: CrossTokenParseState {
                cursor: SourcePosition {
                    index: 0,
                    line: 1,
                    column: 1,
                },
                here_state: HereState::None,
                current_here_tags: vec![],
                queued_tokens: vec![],
            },
        }
    }

    /// Returns the current position in the input stream.
    pub fn current_location(&self) -> Option<SourcePosition> {
        Some(self.cross_state.cursor.clone())
    }

    fn next_char(&mut self) -> Result<Option<char>, TokenizerError> {
        let c = self
            .char_reader
            .next()
            .transpose()
            .map_err(TokenizerError::ReadError)?;

        if let Some(ch) = c {
            if ch == '\n' {
                self.cross_state.cursor.line += 1;
                self.cross_state.cursor.column = 1;
            } else {
                self.cross_state.cursor.column += 1;
            }
            self.cross_state.cursor.index += 1;
        }

        Ok(c)
    }

    fn consume_char(&mut self) -> Result<(), TokenizerError> {
        let _ = self.next_char()?;
        Ok(())
    }

    fn peek_char(&mut self) -> Result<Option<char>, TokenizerError> {
        match self.char_reader.peek() {
            Some(Ok(c)) => Ok(Some(*c)),
            Some(Err(_)) => Err(TokenizerError::FailedDecoding),
            None => Ok(None),
        }
    }

    pub(crate) fn next_token(&mut self) -> Result<TokenizeResult, TokenizerError> {
        self.next_token_until(None, false /* include space? */)
    }

    fn next_token_until(
        &mut self,
        terminating_char: Option<char>,
        include_space: bool,
    ) -> Result<TokenizeResult, TokenizerError> {
        let mut state = TokenParseState::new(&self.cross_state.cursor);
        let mut result: Option<TokenizeResult> = None;

        while result.is_none() {
            // First satisfy token results from our queue. Once we exhaust the queue
            // then we'll look at the input stream.
            if !self.cross_state.queued_tokens.is_empty() {
                return Ok(self.cross_state.queued_tokens.remove(0));
            }

            let next = self.peek_char()?;
            let c = next.unwrap_or('\0');

            if next.is_none() {
                // End of input: we must be out of all quoting and here-documents.
                if state.in_escape {
                    return Err(TokenizerError::UnterminatedEscapeSequence);
                }
                match state.quote_mode {
                    QuoteMode::None => (),
                    QuoteMode::Single(pos) => {
                        return Err(TokenizerError::UnterminatedSingleQuote(pos));
                    }
                    QuoteMode::Double(pos) => {
                        return Err(TokenizerError::UnterminatedDoubleQuote(pos));
                    }
                }

                if !matches!(self.cross_state.here_state, HereState::None) {
                    if self.remove_here_end_tag(&mut state, &mut result, false)? {
                        // We hit the end tag without a trailing newline; go get the
                        // next token.
                        continue;
                    }

                    let tag_names = self
                        .cross_state
                        .current_here_tags
                        .iter()
                        .map(|tag| tag.tag.trim())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(TokenizerError::UnterminatedHereDocuments(tag_names));
                }

                result = state
                    .delimit_current_token(TokenEndReason::EndOfInput, &mut self.cross_state)?;
            //
            // Look for the specially specified terminating char.
            //
            } else if state.unquoted() && terminating_char == Some(c) {
                result = state.delimit_current_token(
                    TokenEndReason::SpecifiedTerminatingChar,
                    &mut self.cross_state,
                )?;
            //
            // Handle being in a here document.
            //
            } else if matches!(self.cross_state.here_state, HereState::InHereDocs) {
                if !self.cross_state.current_here_tags.is_empty()
                    && self.cross_state.current_here_tags[0].remove_tabs
                    && (!state.started_token() || state.current_token().ends_with('\n'))
                    && c == '\t'
                {
                    // Consume it but don't include it.
                    self.consume_char()?;
                } else {
                    self.consume_char()?;
                    state.append_char(c);

                    // See if this was a newline following the terminating here tag.
                    if c == '\n' {
                        self.remove_here_end_tag(&mut state, &mut result, true)?;
                    }
                }
            } else if state.in_operator() {
                // We're in an operator; see if this character continues it.
                let mut hypothetical_token = state.current_token().to_owned();
                hypothetical_token.push(c);

                if state.unquoted() && is_operator(hypothetical_token.as_ref()) {
                    self.consume_char()?;
                    state.append_char(c);
                } else {
                    // If the completed operator starts a here-document, then the
                    // *next* token must be the here tag.
                    if state.is_specific_operator("<<") {
                        self.cross_state.here_state =
                            HereState::NextTokenIsHereTag { remove_tabs: false };
                    } else if state.is_specific_operator("<<-") {
                        self.cross_state.here_state =
                            HereState::NextTokenIsHereTag { remove_tabs: true };
                    }

                    let reason = if state.current_token() == "\n" {
                        TokenEndReason::UnescapedNewLine
                    } else {
                        TokenEndReason::OperatorEnd
                    };

                    result = state.delimit_current_token(reason, &mut self.cross_state)?;
                }
            //
            // See if this is a character that changes the current escaping/quoting state.
            //
            } else if does_char_newly_affect_quoting(&state, c) {
                if c == '\\' {
                    // Consume the backslash ourselves so we can peek past it.
                    self.consume_char()?;

                    if matches!(self.peek_char()?, Some('\n')) {
                        // Line continuation: consume the newline too, include neither.
                        self.consume_char()?;
                    } else {
                        state.in_escape = true;
                        state.append_char(c);
                    }
                } else if c == '\'' {
                    state.quote_mode = QuoteMode::Single(self.cross_state.cursor.clone());
                    self.consume_char()?;
                    state.append_char(c);
                } else if c == '\"' {
                    state.quote_mode = QuoteMode::Double(self.cross_state.cursor.clone());
                    self.consume_char()?;
                    state.append_char(c);
                }
            }
            //
            // Handle end of single-quote or double-quote.
            //
            else if !state.in_escape
                && matches!(state.quote_mode, QuoteMode::Single(..))
                && c == '\''
            {
                state.quote_mode = QuoteMode::None;
                self.consume_char()?;
                state.append_char(c);
            } else if !state.in_escape
                && matches!(state.quote_mode, QuoteMode::Double(..))
                && c == '\"'
            {
                state.quote_mode = QuoteMode::None;
                self.consume_char()?;
                state.append_char(c);
            }
            //
            // Handle end of escape sequence.
            //
            else if state.in_escape {
                state.in_escape = false;
                self.consume_char()?;
                state.append_char(c);
            } else if (state.unquoted()
                || (matches!(state.quote_mode, QuoteMode::Double(_)) && !state.in_escape))
                && (c == '$' || c == '`')
            {
                if c == '$' {
                    self.consume_char()?;
                    match self.peek_char()? {
                        Some('(') => {
                            state.append_char('$');
                            state.append_char(self.next_char()?.unwrap_or_default());

                            // A second '(' means this could be the `$((` form; either
                            // way we must balance two closing parens.
                            let mut required_end_parens = 1;
                            if matches!(self.peek_char()?, Some('(')) {
                                state.append_char(self.next_char()?.unwrap_or_default());
                                required_end_parens = 2;
                            }

                            self.consume_command_substitution(
                                &mut state,
                                required_end_parens,
                            )?;
                        }
                        Some('{') => {
                            state.append_char('$');
                            state.append_char(self.next_char()?.unwrap_or_default());
                            self.consume_braced_parameter(&mut state)?;
                        }
                        _ => {
                            // A lone '$'; keep it as literal text.
                            state.append_char('$');
                        }
                    }
                } else {
                    // Scan for the terminating backquote.
                    let backquote_pos = self.cross_state.cursor.clone();
                    self.consume_char()?;
                    state.append_char(c);

                    let mut escaping_enabled = false;
                    let mut done = false;
                    while !done {
                        let next_char_in_backquote = self.next_char()?;
                        if let Some(cib) = next_char_in_backquote {
                            state.append_char(cib);

                            if !escaping_enabled && cib == '\\' {
                                escaping_enabled = true;
                            } else {
                                if !escaping_enabled && cib == '`' {
                                    done = true;
                                }
                                escaping_enabled = false;
                            }
                        } else {
                            return Err(TokenizerError::UnterminatedBackquote(backquote_pos));
                        }
                    }
                }
            }
            //
            // If the character *can* start an operator, then it will.
            //
            else if state.unquoted() && can_start_operator(c) {
                if state.started_token() {
                    result = state.delimit_current_token(
                        TokenEndReason::OperatorStart,
                        &mut self.cross_state,
                    )?;
                } else {
                    state.token_is_operator = true;
                    self.consume_char()?;
                    state.append_char(c);
                }
            }
            //
            // Whitespace gets discarded (and delimits tokens).
            //
            else if state.unquoted() && is_blank(c) {
                if state.started_token() {
                    result = state.delimit_current_token(
                        TokenEndReason::NonNewLineBlank,
                        &mut self.cross_state,
                    )?;
                } else if include_space {
                    state.append_char(c);
                } else {
                    // Make sure we don't include this char in the token range.
                    state.start_position.column += 1;
                    state.start_position.index += 1;
                }

                self.consume_char()?;
            }
            //
            // If we were recursively called inside a parameter expression, a token may
            // not look started but we're mid-word all the same.
            //
            else if !state.token_is_operator
                && (state.started_token() || matches!(terminating_char, Some('}')))
            {
                self.consume_char()?;
                state.append_char(c);
            } else if c == '#' {
                // Consume the comment up to (but not including) the newline.
                self.consume_char()?;
                loop {
                    match self.peek_char()? {
                        Some('\n') | None => break,
                        _ => self.consume_char()?,
                    }
                }
            } else if state.started_token() {
                result =
                    state.delimit_current_token(TokenEndReason::Other, &mut self.cross_state)?;
            } else {
                self.consume_char()?;
                state.append_char(c);
            }
        }

        Ok(result.unwrap_or(TokenizeResult {
            reason: TokenEndReason::EndOfInput,
            token: None,
        }))
    }

    /// Consumes a `$(`-introduced substitution through its matching close paren,
    /// appending all consumed text (including any embedded here-documents) to the
    /// in-progress token.
    fn consume_command_substitution(
        &mut self,
        state: &mut TokenParseState,
        mut required_end_parens: u32,
    ) -> Result<(), TokenizerError> {
        let mut pending_here_doc_tokens = vec![];
        let mut drain_here_doc_tokens = false;

        loop {
            let cur_token = if drain_here_doc_tokens && !pending_here_doc_tokens.is_empty() {
                if pending_here_doc_tokens.len() == 1 {
                    drain_here_doc_tokens = false;
                }

                pending_here_doc_tokens.remove(0)
            } else {
                let cur_token = self.next_token_until(Some(')'), true /* include space? */)?;

                // Hold onto here-document-related tokens until we've seen everything
                // that needs to come before the body.
                if matches!(
                    cur_token.reason,
                    TokenEndReason::HereDocumentBodyStart
                        | TokenEndReason::HereDocumentBodyEnd
                        | TokenEndReason::HereDocumentEndTag
                ) {
                    pending_here_doc_tokens.push(cur_token);
                    continue;
                }

                cur_token
            };

            if matches!(cur_token.reason, TokenEndReason::UnescapedNewLine)
                && !pending_here_doc_tokens.is_empty()
            {
                pending_here_doc_tokens.push(cur_token);
                drain_here_doc_tokens = true;
                continue;
            }

            if let Some(cur_token_value) = cur_token.token {
                state.append_str(cur_token_value.to_str());

                // An embedded open parenthesis means we need one more close paren
                // before the containing construct ends.
                if matches!(cur_token_value, Token::Operator(ref o, _) if o == "(") {
                    required_end_parens += 1;
                }
            }

            match cur_token.reason {
                TokenEndReason::HereDocumentBodyStart => state.append_char('\n'),
                TokenEndReason::NonNewLineBlank => state.append_char(' '),
                TokenEndReason::SpecifiedTerminatingChar => {
                    required_end_parens -= 1;
                    if required_end_parens == 0 {
                        break;
                    }

                    // Not the last close paren; consume and append it before looping.
                    state.append_char(self.next_char()?.unwrap_or_default());
                }
                TokenEndReason::EndOfInput => {
                    return Err(TokenizerError::UnterminatedCommandSubstitution);
                }
                _ => (),
            }
        }

        state.append_char(self.next_char()?.unwrap_or_default());

        Ok(())
    }

    /// Consumes a `${`-introduced parameter expression through its closing brace,
    /// appending the consumed text to the in-progress token.
    fn consume_braced_parameter(
        &mut self,
        state: &mut TokenParseState,
    ) -> Result<(), TokenizerError> {
        loop {
            let cur_token = self.next_token_until(Some('}'), false /* include space? */)?;

            if let Some(cur_token_value) = cur_token.token {
                state.append_str(cur_token_value.to_str());
            }

            match cur_token.reason {
                TokenEndReason::NonNewLineBlank => state.append_char(' '),
                TokenEndReason::SpecifiedTerminatingChar => {
                    // We found the closing brace but did not yet consume it; do so now.
                    state.append_char(self.next_char()?.unwrap_or_default());
                    break;
                }
                TokenEndReason::EndOfInput => {
                    return Err(TokenizerError::UnterminatedVariable);
                }
                _ => (),
            }
        }

        Ok(())
    }

    fn remove_here_end_tag(
        &mut self,
        state: &mut TokenParseState,
        result: &mut Option<TokenizeResult>,
        ends_with_newline: bool,
    ) -> Result<bool, TokenizerError> {
        // Bail immediately if we don't even have a *starting* here tag.
        if self.cross_state.current_here_tags.is_empty() {
            return Ok(false);
        }

        let next_here_tag = &self.cross_state.current_here_tags[0];

        let tag_str: Cow<'_, str> = if next_here_tag.tag_was_escaped_or_quoted {
            unquote_str(next_here_tag.tag.as_str()).into()
        } else {
            next_here_tag.tag.as_str().into()
        };

        let tag_str = if ends_with_newline {
            tag_str.as_ref()
        } else {
            tag_str.strip_suffix('\n').unwrap_or_else(|| tag_str.as_ref())
        };

        if let Some(current_token_without_here_tag) = state.current_token().strip_suffix(tag_str) {
            // The tag must be at the start of the body or preceded by a newline.
            if current_token_without_here_tag.is_empty()
                || current_token_without_here_tag.ends_with('\n')
            {
                state.replace_with_here_doc(current_token_without_here_tag.to_owned());

                *result = state.delimit_current_token(
                    TokenEndReason::HereDocumentBodyEnd,
                    &mut self.cross_state,
                )?;

                return Ok(true);
            }
        }
        Ok(false)
    }
}

const fn can_start_operator(c: char) -> bool {
    matches!(c, '&' | '(' | ')' | ';' | '\n' | '|' | '<' | '>')
}

fn is_operator(s: &str) -> bool {
    matches!(
        s,
        "&" | "&&"
            | "("
            | ")"
            | ";"
            | ";;"
            | "\n"
            | "|"
            | "||"
            | "<"
            | ">"
            | ">|"
            | "<<"
            | ">>"
            | "<&"
            | ">&"
            | "<<-"
            | "<>"
    )
}

const fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

const fn does_char_newly_affect_quoting(state: &TokenParseState, c: char) -> bool {
    // If we're currently escaped, then nothing affects quoting.
    if state.in_escape {
        return false;
    }

    match state.quote_mode {
        // Inside double quotes, only the backslash starts an escape.
        QuoteMode::Double(_) => c == '\\',
        // Inside single quotes, nothing affects quoting.
        QuoteMode::Single(_) => false,
        QuoteMode::None => is_quoting_char(c),
    }
}

const fn is_quoting_char(c: char) -> bool {
    matches!(c, '\\' | '\'' | '\"')
}

/// Return a string with all the quoting removed.
///
/// # Arguments
///
/// * `s` - The string to unquote.
pub fn unquote_str(s: &str) -> String {
    let mut result = String::new();

    let mut in_escape = false;
    for c in s.chars() {
        match c {
            c if in_escape => {
                result.push(c);
                in_escape = false;
            }
            '\\' => in_escape = true,
            c if is_quoting_char(c) => (),
            c => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn token_strings(input: &str) -> Result<Vec<String>> {
        Ok(tokenize_str(input)?
            .into_iter()
            .map(|t| t.to_str().to_owned())
            .collect())
    }

    #[test]
    fn tokenize_basic_words() -> Result<()> {
        assert_eq!(token_strings("echo hello world")?, ["echo", "hello", "world"]);
        Ok(())
    }

    #[test]
    fn tokenize_operators() -> Result<()> {
        assert_eq!(
            token_strings("a && b || c; d & e | f")?,
            ["a", "&&", "b", "||", "c", ";", "d", "&", "e", "|", "f"]
        );
        Ok(())
    }

    #[test]
    fn tokenize_redirection_operators() -> Result<()> {
        assert_eq!(
            token_strings("cmd > out 2>&1 < in >> log")?,
            ["cmd", ">", "out", "2", ">&", "1", "<", "in", ">>", "log"]
        );
        Ok(())
    }

    #[test]
    fn tokenize_quoted_strings() -> Result<()> {
        assert_eq!(
            token_strings(r#"echo 'single quoted' "double quoted""#)?,
            ["echo", "'single quoted'", "\"double quoted\""]
        );
        Ok(())
    }

    #[test]
    fn tokenize_comment() -> Result<()> {
        assert_eq!(token_strings("echo hi # trailing comment")?, ["echo", "hi"]);
        Ok(())
    }

    #[test]
    fn tokenize_command_substitution_as_single_word() -> Result<()> {
        assert_eq!(
            token_strings("echo $(date +%s)")?,
            ["echo", "$(date +%s)"]
        );
        Ok(())
    }

    #[test]
    fn tokenize_nested_command_substitution() -> Result<()> {
        assert_eq!(
            token_strings("echo $(echo $(echo x))")?,
            ["echo", "$(echo $(echo x))"]
        );
        Ok(())
    }

    #[test]
    fn tokenize_braced_parameter() -> Result<()> {
        assert_eq!(
            token_strings("echo ${HOME:-/root}x")?,
            ["echo", "${HOME:-/root}x"]
        );
        Ok(())
    }

    #[test]
    fn tokenize_line_continuation() -> Result<()> {
        assert_eq!(token_strings("echo ab\\\ncd")?, ["echo", "abcd"]);
        Ok(())
    }

    #[test]
    fn tokenize_here_document() -> Result<()> {
        let tokens = token_strings("cat <<EOF\nhello\nthere\nEOF\n")?;
        assert_eq!(tokens, ["cat", "<<", "EOF", "hello\nthere\n", "EOF", "\n"]);
        Ok(())
    }

    #[test]
    fn tokenize_here_document_removing_tabs() -> Result<()> {
        let tokens = token_strings("cat <<-EOF\n\thello\n\tEOF\n")?;
        assert_eq!(tokens, ["cat", "<<-", "EOF", "hello\n", "EOF", "\n"]);
        Ok(())
    }

    #[test]
    fn unterminated_quote_is_incomplete() {
        let err = tokenize_str("echo 'oops").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn unterminated_here_document_is_incomplete() {
        let err = tokenize_str("cat <<EOF\nhello\n").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn unquote_removes_quoting() {
        assert_eq!(unquote_str(r#"'a b'"#), "a b");
        assert_eq!(unquote_str(r#"\$x"#), "$x");
        assert_eq!(unquote_str(r#""hi""#), "hi");
    }
}

//! Error types for the parser.

use crate::tokenizer;

/// Represents an error that occurred while parsing tokens.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// A parsing error occurred near the given token.
    #[error("parse error near token: {0}")]
    ParsingNearToken(tokenizer::Token),

    /// A parsing error occurred at the end of the input.
    #[error("parse error at end of input")]
    ParsingAtEndOfInput,

    /// An error occurred while tokenizing the input stream.
    #[error("{inner}")]
    Tokenizing {
        /// The inner tokenizer error.
        inner: tokenizer::TokenizerError,
        /// The approximate position of the error in the input stream.
        position: Option<tokenizer::SourcePosition>,
    },
}

impl ParseError {
    /// Returns true if the error may be resolved by providing more input,
    /// e.g., an unterminated quote or a here-document still awaiting its body.
    pub const fn is_incomplete(&self) -> bool {
        match self {
            Self::ParsingAtEndOfInput => true,
            Self::Tokenizing { inner, .. } => inner.is_incomplete(),
            Self::ParsingNearToken(_) => false,
        }
    }
}

/// Represents an error that occurred while parsing a word for expansion.
#[derive(thiserror::Error, Debug)]
pub enum WordParseError {
    /// An error occurred while parsing a word.
    #[error("failed to parse word '{0}'")]
    Word(String, peg::error::ParseError<peg::str::LineCol>),

    /// An error occurred while parsing a parameter.
    #[error("failed to parse parameter '{0}'")]
    Parameter(String, peg::error::ParseError<peg::str::LineCol>),
}

pub(crate) fn convert_peg_parse_error(
    err: &peg::error::ParseError<usize>,
    tokens: &[tokenizer::Token],
) -> ParseError {
    let approx_token_index = err.location;

    if approx_token_index < tokens.len() {
        ParseError::ParsingNearToken(tokens[approx_token_index].clone())
    } else {
        ParseError::ParsingAtEndOfInput
    }
}

//! Implements a tokenizer and parser for POSIX shell syntax.

pub mod ast;
mod error;
mod parser;
mod tokenizer;
pub mod word;

pub use error::{ParseError, WordParseError};
pub use parser::{parse_tokens, Parser, ParserOptions};
pub use tokenizer::{
    tokenize_str, unquote_str, SourcePosition, Token, TokenLocation, Tokenizer, TokenizerError,
    TokenizerOptions,
};

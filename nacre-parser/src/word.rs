//! Parses words into their constituent pieces for expansion.

use crate::error;
use crate::parser::ParserOptions;

/// A piece of a word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordPiece {
    /// A simple unquoted, unexpanded string.
    Text(String),
    /// A string that is single-quoted.
    SingleQuotedText(String),
    /// A sequence of pieces that are embedded in double quotes.
    DoubleQuotedSequence(Vec<WordPiece>),
    /// A tilde prefix.
    TildePrefix(String),
    /// A parameter expansion.
    ParameterExpansion(ParameterExpr),
    /// A command substitution.
    CommandSubstitution(String),
    /// A backquoted command substitution.
    BackquotedCommandSubstitution(String),
    /// An escape sequence.
    EscapeSequence(String),
}

/// Type of a parameter test used in a parameter expansion expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterTestType {
    /// Checking whether the parameter is unset.
    Unset,
    /// Checking whether the parameter is unset or null.
    UnsetOrNull,
}

/// A parameter, used in a parameter expansion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// A 1-indexed positional parameter.
    Positional(u32),
    /// A special parameter.
    Special(SpecialParameter),
    /// A named variable.
    Named(String),
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positional(p) => write!(f, "{p}"),
            Self::Special(s) => write!(f, "{s}"),
            Self::Named(n) => write!(f, "{n}"),
        }
    }
}

/// A special shell parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpecialParameter {
    /// All positional parameters (`$@` or `$*`).
    AllPositionalParameters {
        /// Whether the parameters are to be concatenated into a single field.
        concatenate: bool,
    },
    /// The count of positional parameters (`$#`).
    PositionalParameterCount,
    /// The last exit status (`$?`).
    LastExitStatus,
    /// The current option flags (`$-`).
    CurrentOptionFlags,
    /// The shell's process ID (`$$`).
    ProcessId,
    /// The process ID of the last background command (`$!`).
    LastBackgroundProcessId,
    /// The name of the shell or script (`$0`).
    ShellName,
}

impl std::fmt::Display for SpecialParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllPositionalParameters { concatenate } => {
                write!(f, "{}", if *concatenate { "*" } else { "@" })
            }
            Self::PositionalParameterCount => write!(f, "#"),
            Self::LastExitStatus => write!(f, "?"),
            Self::CurrentOptionFlags => write!(f, "-"),
            Self::ProcessId => write!(f, "$"),
            Self::LastBackgroundProcessId => write!(f, "!"),
            Self::ShellName => write!(f, "0"),
        }
    }
}

/// A parameter expansion expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterExpr {
    /// A plain parameter reference.
    Parameter {
        /// The parameter being referenced.
        parameter: Parameter,
    },
    /// Use a default value when the parameter fails the test (`${p:-word}`).
    UseDefaultValues {
        /// The parameter being tested.
        parameter: Parameter,
        /// The test applied to the parameter.
        test_type: ParameterTestType,
        /// The default value.
        default_value: Option<String>,
    },
    /// Assign a default value when the parameter fails the test (`${p:=word}`).
    AssignDefaultValues {
        /// The parameter being tested.
        parameter: Parameter,
        /// The test applied to the parameter.
        test_type: ParameterTestType,
        /// The default value to assign.
        default_value: Option<String>,
    },
    /// Report an error when the parameter fails the test (`${p:?word}`).
    IndicateErrorIfNullOrUnset {
        /// The parameter being tested.
        parameter: Parameter,
        /// The test applied to the parameter.
        test_type: ParameterTestType,
        /// The error message.
        error_message: Option<String>,
    },
    /// Use an alternative value when the parameter passes the test (`${p:+word}`).
    UseAlternativeValue {
        /// The parameter being tested.
        parameter: Parameter,
        /// The test applied to the parameter.
        test_type: ParameterTestType,
        /// The alternative value.
        alternative_value: Option<String>,
    },
    /// The length in characters of the parameter's value (`${#p}`).
    ParameterLength {
        /// The parameter being measured.
        parameter: Parameter,
    },
    /// Remove the smallest matching suffix (`${p%pattern}`).
    RemoveSmallestSuffixPattern {
        /// The parameter being edited.
        parameter: Parameter,
        /// The pattern to remove.
        pattern: Option<String>,
    },
    /// Remove the largest matching suffix (`${p%%pattern}`).
    RemoveLargestSuffixPattern {
        /// The parameter being edited.
        parameter: Parameter,
        /// The pattern to remove.
        pattern: Option<String>,
    },
    /// Remove the smallest matching prefix (`${p#pattern}`).
    RemoveSmallestPrefixPattern {
        /// The parameter being edited.
        parameter: Parameter,
        /// The pattern to remove.
        pattern: Option<String>,
    },
    /// Remove the largest matching prefix (`${p##pattern}`).
    RemoveLargestPrefixPattern {
        /// The parameter being edited.
        parameter: Parameter,
        /// The pattern to remove.
        pattern: Option<String>,
    },
}

/// Parse a word into its constituent pieces.
///
/// # Arguments
///
/// * `word` - The word to parse.
/// * `options` - The parser options to use.
pub fn parse(word: &str, options: &ParserOptions) -> Result<Vec<WordPiece>, error::WordParseError> {
    cacheable_parse(word.to_owned(), options.clone())
}

#[cached::proc_macro::cached(size = 64, result = true)]
fn cacheable_parse(
    word: String,
    options: ParserOptions,
) -> Result<Vec<WordPiece>, error::WordParseError> {
    tracing::debug!(target: "expansion", "parsing word '{word}'");

    let pieces = expansion_parser::unexpanded_word(word.as_str(), &options)
        .map_err(|err| error::WordParseError::Word(word.clone(), err))?;

    tracing::debug!(target: "expansion", "parsed word '{word}' => {{{pieces:?}}}");

    Ok(pieces)
}

/// Parse the given string as a parameter expression.
///
/// # Arguments
///
/// * `word` - The string to parse.
/// * `options` - The parser options to use.
pub fn parse_parameter(
    word: &str,
    options: &ParserOptions,
) -> Result<Parameter, error::WordParseError> {
    expansion_parser::parameter(word, options)
        .map_err(|err| error::WordParseError::Parameter(word.to_owned(), err))
}

peg::parser! {
    grammar expansion_parser(parser_options: &ParserOptions) for str {
        pub(crate) rule unexpanded_word() -> Vec<WordPiece> =
            word(<![_]>)

        rule word<T>(stop_condition: rule<T>) -> Vec<WordPiece> =
            tilde:tilde_prefix()? pieces:word_piece(<stop_condition()>, false /*in_command*/)* {
                let mut all_pieces = Vec::new();
                if let Some(tilde) = tilde {
                    all_pieces.push(tilde);
                }
                all_pieces.extend(pieces);
                all_pieces
            }

        rule word_piece<T>(stop_condition: rule<T>, in_command: bool) -> WordPiece =
            s:double_quoted_sequence() { WordPiece::DoubleQuotedSequence(s) } /
            s:single_quoted_literal_text() { WordPiece::SingleQuotedText(s.to_owned()) } /
            command_substitution() /
            parameter_expansion() /
            normal_escape_sequence() /
            unquoted_literal_text(<stop_condition()>, in_command)

        rule double_quoted_word_piece() -> WordPiece =
            command_substitution() /
            parameter_expansion() /
            double_quoted_escape_sequence() /
            double_quoted_text()

        rule double_quoted_sequence() -> Vec<WordPiece> =
            "\"" i:double_quoted_word_piece()* "\"" { i }

        rule single_quoted_literal_text() -> &'input str =
            "\'" inner:$([^'\'']*) "\'" { inner }

        rule unquoted_literal_text<T>(stop_condition: rule<T>, in_command: bool) -> WordPiece =
            s:$(unquoted_literal_text_piece(<stop_condition()>, in_command)+) { WordPiece::Text(s.to_owned()) }

        rule unquoted_literal_text_piece<T>(stop_condition: rule<T>, in_command: bool) =
            is_true(in_command) subshell_command() /
            !stop_condition() !normal_escape_sequence() [^'$' | '\'' | '\"' | '`'] {}

        rule is_true(value: bool) = &[_] {? if value { Ok(()) } else { Err("not true") } }

        rule subshell_command() =
            "(" command() ")" {}

        rule double_quoted_text() -> WordPiece =
            s:double_quote_body_text() { WordPiece::Text(s.to_owned()) }

        rule double_quote_body_text() -> &'input str =
            $((!double_quoted_escape_sequence() [^'$' | '\"' | '`'])+)

        rule normal_escape_sequence() -> WordPiece =
            s:$("\\" [c]) { WordPiece::EscapeSequence(s.to_owned()) }

        rule double_quoted_escape_sequence() -> WordPiece =
            s:$("\\" ['$' | '`' | '\"' | '\'' | '\\']) { WordPiece::EscapeSequence(s.to_owned()) }

        rule tilde_prefix() -> WordPiece =
            "~" cs:$((![ '/' | ':' ] [c])*) { WordPiece::TildePrefix(cs.to_owned()) }

        rule parameter_expansion() -> WordPiece =
            "${" e:parameter_expression() "}" {
                WordPiece::ParameterExpansion(e)
            } /
            "$" parameter:unbraced_parameter() {
                WordPiece::ParameterExpansion(ParameterExpr::Parameter { parameter })
            } /
            "$" !['\''] {
                WordPiece::Text("$".to_owned())
            }

        rule parameter_expression() -> ParameterExpr =
            parameter:parameter() test_type:parameter_test_type() "-" default_value:parameter_expression_word()? {
                ParameterExpr::UseDefaultValues { parameter, test_type, default_value }
            } /
            parameter:parameter() test_type:parameter_test_type() "=" default_value:parameter_expression_word()? {
                ParameterExpr::AssignDefaultValues { parameter, test_type, default_value }
            } /
            parameter:parameter() test_type:parameter_test_type() "?" error_message:parameter_expression_word()? {
                ParameterExpr::IndicateErrorIfNullOrUnset { parameter, test_type, error_message }
            } /
            parameter:parameter() test_type:parameter_test_type() "+" alternative_value:parameter_expression_word()? {
                ParameterExpr::UseAlternativeValue { parameter, test_type, alternative_value }
            } /
            "#" parameter:parameter() {
                ParameterExpr::ParameterLength { parameter }
            } /
            parameter:parameter() "%%" pattern:parameter_expression_word()? {
                ParameterExpr::RemoveLargestSuffixPattern { parameter, pattern }
            } /
            parameter:parameter() "%" pattern:parameter_expression_word()? {
                ParameterExpr::RemoveSmallestSuffixPattern { parameter, pattern }
            } /
            parameter:parameter() "##" pattern:parameter_expression_word()? {
                ParameterExpr::RemoveLargestPrefixPattern { parameter, pattern }
            } /
            parameter:parameter() "#" pattern:parameter_expression_word()? {
                ParameterExpr::RemoveSmallestPrefixPattern { parameter, pattern }
            } /
            parameter:parameter() {
                ParameterExpr::Parameter { parameter }
            }

        rule parameter_test_type() -> ParameterTestType =
            colon:":"? {
                if colon.is_some() {
                    ParameterTestType::UnsetOrNull
                } else {
                    ParameterTestType::Unset
                }
            }

        rule unbraced_parameter() -> Parameter =
            p:unbraced_positional_parameter() { Parameter::Positional(p) } /
            p:special_parameter() { Parameter::Special(p) } /
            p:variable_name() { Parameter::Named(p.to_owned()) }

        pub(crate) rule parameter() -> Parameter =
            p:positional_parameter() { Parameter::Positional(p) } /
            p:special_parameter() { Parameter::Special(p) } /
            p:variable_name() { Parameter::Named(p.to_owned()) }

        rule positional_parameter() -> u32 =
            n:$(['1'..='9'](['0'..='9']*)) {? n.parse().or(Err("u32")) }

        rule unbraced_positional_parameter() -> u32 =
            n:$(['1'..='9']) {? n.parse().or(Err("u32")) }

        rule special_parameter() -> SpecialParameter =
            "@" { SpecialParameter::AllPositionalParameters { concatenate: false } } /
            "*" { SpecialParameter::AllPositionalParameters { concatenate: true } } /
            "#" { SpecialParameter::PositionalParameterCount } /
            "?" { SpecialParameter::LastExitStatus } /
            "-" { SpecialParameter::CurrentOptionFlags } /
            "$" { SpecialParameter::ProcessId } /
            "!" { SpecialParameter::LastBackgroundProcessId } /
            "0" { SpecialParameter::ShellName }

        rule variable_name() -> &'input str =
            $(!['0'..='9'] ['_' | '0'..='9' | 'a'..='z' | 'A'..='Z']+)

        pub(crate) rule command_substitution() -> WordPiece =
            "$(" c:command() ")" { WordPiece::CommandSubstitution(c.to_owned()) } /
            "`" c:backquoted_command() "`" { WordPiece::BackquotedCommandSubstitution(c) }

        pub(crate) rule command() -> &'input str =
            $(command_piece()*)

        pub(crate) rule command_piece() -> () =
            word_piece(<[')']>, true /*in_command*/) {} /
            ([' ' | '\t' | '\n'])+ {}

        rule backquoted_command() -> String =
            chars:(backquoted_char()*) { chars.into_iter().collect() }

        rule backquoted_char() -> &'input str =
            "\\`" { "`" } /
            s:$([^'`']) { s }

        rule parameter_expression_word() -> String =
            s:$(word(<['}']>)) { s.to_owned() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn parse_word(word: &str) -> Result<Vec<WordPiece>> {
        Ok(parse(word, &ParserOptions::default())?)
    }

    #[test]
    fn parse_plain_text() -> Result<()> {
        assert_eq!(parse_word("hello")?, [WordPiece::Text("hello".to_owned())]);
        Ok(())
    }

    #[test]
    fn parse_quoted_pieces() -> Result<()> {
        assert_eq!(
            parse_word(r#"'sq'"dq""#)?,
            [
                WordPiece::SingleQuotedText("sq".to_owned()),
                WordPiece::DoubleQuotedSequence(vec![WordPiece::Text("dq".to_owned())]),
            ]
        );
        Ok(())
    }

    #[test]
    fn parse_unbraced_parameter() -> Result<()> {
        assert_eq!(
            parse_word("$HOME")?,
            [WordPiece::ParameterExpansion(ParameterExpr::Parameter {
                parameter: Parameter::Named("HOME".to_owned())
            })]
        );
        Ok(())
    }

    #[test]
    fn parse_special_parameters() -> Result<()> {
        assert_eq!(
            parse_word("$?")?,
            [WordPiece::ParameterExpansion(ParameterExpr::Parameter {
                parameter: Parameter::Special(SpecialParameter::LastExitStatus)
            })]
        );
        assert_eq!(
            parse_word("$@")?,
            [WordPiece::ParameterExpansion(ParameterExpr::Parameter {
                parameter: Parameter::Special(SpecialParameter::AllPositionalParameters {
                    concatenate: false
                })
            })]
        );
        Ok(())
    }

    #[test]
    fn parse_braced_parameter_with_default() -> Result<()> {
        assert_eq!(
            parse_word("${NAME:-fallback}")?,
            [WordPiece::ParameterExpansion(
                ParameterExpr::UseDefaultValues {
                    parameter: Parameter::Named("NAME".to_owned()),
                    test_type: ParameterTestType::UnsetOrNull,
                    default_value: Some("fallback".to_owned()),
                }
            )]
        );
        Ok(())
    }

    #[test]
    fn parse_parameter_length() -> Result<()> {
        assert_eq!(
            parse_word("${#NAME}")?,
            [WordPiece::ParameterExpansion(
                ParameterExpr::ParameterLength {
                    parameter: Parameter::Named("NAME".to_owned())
                }
            )]
        );
        Ok(())
    }

    #[test]
    fn parse_suffix_removal() -> Result<()> {
        assert_eq!(
            parse_word("${f%%.*}")?,
            [WordPiece::ParameterExpansion(
                ParameterExpr::RemoveLargestSuffixPattern {
                    parameter: Parameter::Named("f".to_owned()),
                    pattern: Some(".*".to_owned()),
                }
            )]
        );
        Ok(())
    }

    #[test]
    fn parse_command_substitution() -> Result<()> {
        assert_eq!(
            parse_word("$(echo hi)")?,
            [WordPiece::CommandSubstitution("echo hi".to_owned())]
        );
        assert_eq!(
            parse_word("`echo hi`")?,
            [WordPiece::BackquotedCommandSubstitution("echo hi".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn parse_nested_command_substitution() -> Result<()> {
        assert_eq!(
            parse_word("$(echo (sub))")?,
            [WordPiece::CommandSubstitution("echo (sub)".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn parse_tilde_prefix() -> Result<()> {
        assert_eq!(
            parse_word("~/docs")?,
            [
                WordPiece::TildePrefix(String::new()),
                WordPiece::Text("/docs".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn parse_escape_sequence() -> Result<()> {
        assert_eq!(
            parse_word(r"a\ b")?,
            [
                WordPiece::Text("a".to_owned()),
                WordPiece::EscapeSequence(r"\ ".to_owned()),
                WordPiece::Text("b".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn parse_mixed_double_quote() -> Result<()> {
        assert_eq!(
            parse_word(r#""hi $USER""#)?,
            [WordPiece::DoubleQuotedSequence(vec![
                WordPiece::Text("hi ".to_owned()),
                WordPiece::ParameterExpansion(ParameterExpr::Parameter {
                    parameter: Parameter::Named("USER".to_owned())
                }),
            ])]
        );
        Ok(())
    }
}

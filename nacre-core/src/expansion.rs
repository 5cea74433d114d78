//! Word expansion utilities.

use itertools::Itertools;
use nacre_parser::ast;
use nacre_parser::word::{Parameter, ParameterExpr, ParameterTestType, SpecialParameter, WordPiece};

use crate::interp::ExecutionParameters;
use crate::shell::Shell;
use crate::{commands, env, error, patterns, sys};

/// The intermediate result of expanding one word: an ordered list of fields,
/// each made of pieces that either may or may not undergo later splitting.
#[derive(Debug)]
struct Expansion {
    fields: Vec<WordField>,
    concatenate: bool,
    undefined: bool,
}

impl Default for Expansion {
    fn default() -> Self {
        Self {
            fields: vec![],
            concatenate: true,
            undefined: false,
        }
    }
}

impl From<Expansion> for String {
    fn from(value: Expansion) -> Self {
        value.fields.into_iter().map(Self::from).join(" ")
    }
}

impl From<String> for Expansion {
    fn from(value: String) -> Self {
        Self {
            fields: vec![WordField::from(value)],
            ..Self::default()
        }
    }
}

impl From<ExpansionPiece> for Expansion {
    fn from(piece: ExpansionPiece) -> Self {
        Self {
            fields: vec![WordField::from(piece)],
            ..Self::default()
        }
    }
}

impl Expansion {
    fn classify(&self) -> ParameterState {
        let non_empty = self
            .fields
            .iter()
            .any(|field| field.0.iter().any(|piece| !piece.as_str().is_empty()));

        if self.undefined {
            ParameterState::Undefined
        } else if non_empty {
            ParameterState::NonZeroLength
        } else {
            ParameterState::DefinedEmptyString
        }
    }

    fn undefined() -> Self {
        Self {
            fields: vec![WordField::from(String::new())],
            concatenate: true,
            undefined: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct WordField(Vec<ExpansionPiece>);

impl WordField {
    pub const fn new() -> Self {
        Self(vec![])
    }
}

impl From<WordField> for String {
    fn from(field: WordField) -> Self {
        field.0.into_iter().map(Self::from).collect()
    }
}

impl From<WordField> for patterns::Pattern {
    fn from(value: WordField) -> Self {
        let pieces: Vec<_> = value
            .0
            .into_iter()
            .map(patterns::PatternPiece::from)
            .collect();

        Self::from(pieces)
    }
}

impl From<ExpansionPiece> for WordField {
    fn from(piece: ExpansionPiece) -> Self {
        Self(vec![piece])
    }
}

impl From<String> for WordField {
    fn from(value: String) -> Self {
        Self(vec![ExpansionPiece::Splittable(value)])
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ExpansionPiece {
    /// A piece that must not be split or used as a pattern; it came from a
    /// quoted region.
    Unsplittable(String),
    /// A piece subject to field splitting and pathname expansion.
    Splittable(String),
}

impl From<ExpansionPiece> for String {
    fn from(piece: ExpansionPiece) -> Self {
        match piece {
            ExpansionPiece::Unsplittable(s) => s,
            ExpansionPiece::Splittable(s) => s,
        }
    }
}

impl From<ExpansionPiece> for patterns::PatternPiece {
    fn from(piece: ExpansionPiece) -> Self {
        match piece {
            ExpansionPiece::Unsplittable(s) => Self::Literal(s),
            ExpansionPiece::Splittable(s) => Self::Pattern(s),
        }
    }
}

impl ExpansionPiece {
    fn as_str(&self) -> &str {
        match self {
            Self::Unsplittable(s) => s.as_str(),
            Self::Splittable(s) => s.as_str(),
        }
    }

    fn make_unsplittable(self) -> Self {
        match self {
            Self::Unsplittable(_) => self,
            Self::Splittable(s) => Self::Unsplittable(s),
        }
    }
}

enum ParameterState {
    Undefined,
    DefinedEmptyString,
    NonZeroLength,
}

pub(crate) async fn basic_expand_word(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<String, error::Error> {
    basic_expand_str(shell, params, word.flatten().as_str()).await
}

pub(crate) async fn basic_expand_str(
    shell: &mut Shell,
    params: &ExecutionParameters,
    s: &str,
) -> Result<String, error::Error> {
    let mut expander = WordExpander::new(shell, params);
    expander.basic_expand_to_str(s).await
}

pub(crate) async fn basic_expand_pattern(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<patterns::Pattern, error::Error> {
    let mut expander = WordExpander::new(shell, params);
    expander.basic_expand_pattern(&word.flatten()).await
}

pub(crate) async fn full_expand_and_split_word(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<Vec<String>, error::Error> {
    full_expand_and_split_str(shell, params, word.flatten().as_str()).await
}

pub(crate) async fn full_expand_and_split_str(
    shell: &mut Shell,
    params: &ExecutionParameters,
    s: &str,
) -> Result<Vec<String>, error::Error> {
    let mut expander = WordExpander::new(shell, params);
    expander.full_expand_with_splitting(s).await
}

struct WordExpander<'a> {
    shell: &'a mut Shell,
    params: &'a ExecutionParameters,
    parser_options: nacre_parser::ParserOptions,
    in_double_quotes: bool,
}

impl<'a> WordExpander<'a> {
    pub fn new(shell: &'a mut Shell, params: &'a ExecutionParameters) -> Self {
        let parser_options = shell.parser_options();
        Self {
            shell,
            params,
            parser_options,
            in_double_quotes: false,
        }
    }

    /// Apply tilde expansion, parameter expansion, and command substitution;
    /// return the resulting string.
    pub async fn basic_expand_to_str(&mut self, word: &str) -> Result<String, error::Error> {
        Ok(String::from(self.basic_expand(word).await?))
    }

    async fn basic_expand_pattern(
        &mut self,
        word: &str,
    ) -> Result<patterns::Pattern, error::Error> {
        let expansion = self.basic_expand(word).await?;

        #[allow(unstable_name_collisions)]
        let pattern_pieces: Vec<_> = expansion
            .fields
            .into_iter()
            .map(|field| {
                field
                    .0
                    .into_iter()
                    .map(patterns::PatternPiece::from)
                    .collect::<Vec<_>>()
            })
            .intersperse(vec![patterns::PatternPiece::Literal(String::from(" "))])
            .flatten()
            .collect();

        Ok(patterns::Pattern::from(pattern_pieces))
    }

    async fn basic_expand_opt_pattern(
        &mut self,
        word: Option<&String>,
    ) -> Result<Option<patterns::Pattern>, error::Error> {
        if let Some(word) = word {
            let pattern = self.basic_expand_pattern(word).await?;
            Ok(Some(pattern))
        } else {
            Ok(None)
        }
    }

    /// Apply tilde expansion, parameter expansion, and command substitution;
    /// yield pieces that could be further processed.
    async fn basic_expand(&mut self, word: &str) -> Result<Expansion, error::Error> {
        tracing::debug!(target: "expansion", "basic expanding: '{word}'");

        // Quick short circuit to avoid more expensive parsing. The characters
        // below are the *only* ones indicative of possible expansion; false
        // positives merely cost a parse.
        if !word.contains(['$', '`', '\\', '\'', '\"', '~']) {
            return Ok(Expansion::from(ExpansionPiece::Splittable(word.to_owned())));
        }

        let mut expansions = vec![];
        for piece in nacre_parser::word::parse(word, &self.parser_options)? {
            let piece_expansion = self.expand_word_piece(piece).await?;
            expansions.push(piece_expansion);
        }

        Ok(coalesce_expansions(expansions))
    }

    /// Expand a word used inside a parameter expansion (like the word in
    /// `${param:+word}`). Inside double quotes the word keeps double-quote
    /// parsing semantics.
    async fn expand_parameter_word(&mut self, word: &str) -> Result<Expansion, error::Error> {
        if self.in_double_quotes {
            // If the word is itself double-quoted, strip the quotes and expand
            // the inside with normal semantics.
            if let Some(stripped) = word.strip_prefix('"') {
                if let Some(inner) = stripped.strip_suffix('"') {
                    let previously_in_double_quotes = self.in_double_quotes;
                    self.in_double_quotes = false;

                    let result = self.basic_expand(inner).await;
                    self.in_double_quotes = previously_in_double_quotes;

                    return result;
                }
            }

            // Not double-quoted; wrap in quotes to get double-quote parsing
            // semantics.
            let wrapped = std::format!("\"{word}\"");
            self.basic_expand(&wrapped).await
        } else {
            self.basic_expand(word).await
        }
    }

    /// Apply the basic expansions, then field splitting and pathname expansion.
    pub async fn full_expand_with_splitting(
        &mut self,
        word: &str,
    ) -> Result<Vec<String>, error::Error> {
        let basic_expansion = self.basic_expand(word).await?;

        let fields: Vec<WordField> = self.split_fields(basic_expansion);

        // Now expand pathnames if enabled. This also unquotes as a side effect.
        let result = fields
            .into_iter()
            .flat_map(|field| {
                if self.shell.options.disable_filename_globbing {
                    vec![String::from(field)]
                } else {
                    self.expand_pathnames_in_field(field)
                }
            })
            .collect();

        Ok(result)
    }

    fn split_fields(&self, expansion: Expansion) -> Vec<WordField> {
        let ifs = self.shell.ifs();

        let mut fields: Vec<WordField> = vec![];
        let mut current_field = WordField::new();

        for existing_field in expansion.fields {
            for piece in existing_field.0 {
                match piece {
                    ExpansionPiece::Unsplittable(_) => current_field.0.push(piece),
                    ExpansionPiece::Splittable(s) => {
                        for c in s.chars() {
                            if ifs.contains(c) {
                                if !current_field.0.is_empty() {
                                    fields.push(std::mem::take(&mut current_field));
                                }
                            } else {
                                match current_field.0.last_mut() {
                                    Some(ExpansionPiece::Splittable(last)) => last.push(c),
                                    Some(ExpansionPiece::Unsplittable(_)) | None => {
                                        current_field
                                            .0
                                            .push(ExpansionPiece::Splittable(c.to_string()));
                                    }
                                }
                            }
                        }
                    }
                }
            }

            if !current_field.0.is_empty() {
                fields.push(std::mem::take(&mut current_field));
            }
        }

        fields
    }

    fn expand_pathnames_in_field(&self, field: WordField) -> Vec<String> {
        let pattern = patterns::Pattern::from(field.clone());

        let expansions = pattern
            .expand(self.shell.working_dir.as_path())
            .unwrap_or_default();

        // Per POSIX, a pattern with no matches is kept literal.
        if expansions.is_empty() {
            vec![String::from(field)]
        } else {
            expansions
        }
    }

    #[async_recursion::async_recursion]
    async fn expand_word_piece(&mut self, word_piece: WordPiece) -> Result<Expansion, error::Error> {
        let expansion: Expansion = match word_piece {
            WordPiece::Text(s) => Expansion::from(ExpansionPiece::Splittable(s)),
            WordPiece::SingleQuotedText(s) => Expansion::from(ExpansionPiece::Unsplittable(s)),
            WordPiece::DoubleQuotedSequence(pieces) => {
                let pieces_is_empty = pieces.is_empty();

                // Save the previous state and set the flag.
                let previously_in_double_quotes = self.in_double_quotes;
                self.in_double_quotes = true;

                // Process pieces; don't inspect the result until we've restored
                // the previous value of the flag.
                let result = self.process_double_quoted_pieces(pieces).await;

                self.in_double_quotes = previously_in_double_quotes;

                let mut fields = result?;

                // If there were no pieces, yield a single field containing an
                // empty, unsplittable string.
                if pieces_is_empty {
                    fields.push(WordField::from(ExpansionPiece::Unsplittable(String::new())));
                }

                Expansion {
                    fields,
                    concatenate: false,
                    undefined: false,
                }
            }
            WordPiece::TildePrefix(prefix) => Expansion::from(ExpansionPiece::Unsplittable(
                self.expand_tilde_expression(prefix.as_str())?,
            )),
            WordPiece::ParameterExpansion(p) => self.expand_parameter_expr(p).await?,
            WordPiece::CommandSubstitution(s) | WordPiece::BackquotedCommandSubstitution(s) => {
                let output_str = commands::invoke_command_in_subshell_and_get_output(
                    self.shell,
                    self.params,
                    s.as_str(),
                )
                .await?;

                // Trailing newlines are trimmed.
                let trimmed = output_str.trim_end_matches('\n');

                Expansion::from(ExpansionPiece::Splittable(trimmed.to_owned()))
            }
            WordPiece::EscapeSequence(s) => {
                let expanded = s.strip_prefix('\\').unwrap_or(s.as_str());
                Expansion::from(ExpansionPiece::Unsplittable(expanded.to_owned()))
            }
        };

        Ok(expansion)
    }

    fn expand_tilde_expression(&self, prefix: &str) -> Result<String, error::Error> {
        if !prefix.is_empty() {
            Ok(sys::users::get_user_home_dir(prefix).map_or_else(
                || std::format!("~{prefix}"),
                |p| p.to_string_lossy().to_string(),
            ))
        } else if let Some(home_dir) = self.shell.home_dir() {
            Ok(home_dir)
        } else {
            Err(error::Error::TildeWithoutValidHome)
        }
    }

    /// Processes pieces within a double-quoted sequence, building fields with
    /// proper concatenation.
    async fn process_double_quoted_pieces(
        &mut self,
        pieces: Vec<WordPiece>,
    ) -> Result<Vec<WordField>, error::Error> {
        let mut fields: Vec<WordField> = vec![];
        let concatenation_joiner = self.shell.get_ifs_first_char();

        for piece in pieces {
            let Expansion {
                fields: this_fields,
                concatenate,
                ..
            } = self.expand_word_piece(piece).await?;

            let fields_to_append = if concatenate {
                #[allow(unstable_name_collisions)]
                let mut concatenated: Vec<ExpansionPiece> = this_fields
                    .into_iter()
                    .map(|WordField(pieces)| {
                        pieces
                            .into_iter()
                            .map(|piece| piece.make_unsplittable())
                            .collect()
                    })
                    .intersperse(vec![ExpansionPiece::Unsplittable(
                        concatenation_joiner.to_string(),
                    )])
                    .flatten()
                    .collect();

                // If there were no pieces, keep an empty string so the field
                // still materializes.
                if concatenated.is_empty() {
                    concatenated.push(ExpansionPiece::Splittable(String::new()));
                }

                vec![WordField(concatenated)]
            } else {
                this_fields
            };

            for (i, WordField(next_pieces)) in fields_to_append.into_iter().enumerate() {
                // Flip to unsplittable; we're inside double quotes.
                let mut next_pieces: Vec<_> = next_pieces
                    .into_iter()
                    .map(|piece| piece.make_unsplittable())
                    .collect();

                if i == 0 {
                    if let Some(WordField(last_pieces)) = fields.last_mut() {
                        last_pieces.append(&mut next_pieces);
                        continue;
                    }
                }

                fields.push(WordField(next_pieces));
            }
        }

        Ok(fields)
    }

    async fn expand_parameter_expr(
        &mut self,
        expr: ParameterExpr,
    ) -> Result<Expansion, error::Error> {
        match expr {
            ParameterExpr::Parameter { parameter } => {
                let expansion = self.expand_parameter(&parameter)?;

                if expansion.undefined && self.shell.options.treat_unset_variables_as_error {
                    return Err(error::Error::CheckedExpansionError(std::format!(
                        "{parameter}: parameter not set"
                    )));
                }

                Ok(expansion)
            }
            ParameterExpr::UseDefaultValues {
                parameter,
                test_type,
                default_value,
            } => {
                let expanded_parameter = self.expand_parameter(&parameter)?;
                let default_value = default_value.as_deref().unwrap_or("");

                match (test_type, expanded_parameter.classify()) {
                    (_, ParameterState::NonZeroLength)
                    | (ParameterTestType::Unset, ParameterState::DefinedEmptyString) => {
                        Ok(expanded_parameter)
                    }
                    _ => Ok(self.expand_parameter_word(default_value).await?),
                }
            }
            ParameterExpr::AssignDefaultValues {
                parameter,
                test_type,
                default_value,
            } => {
                let expanded_parameter = self.expand_parameter(&parameter)?;
                let default_value = default_value.as_deref().unwrap_or("");

                match (test_type, expanded_parameter.classify()) {
                    (_, ParameterState::NonZeroLength)
                    | (ParameterTestType::Unset, ParameterState::DefinedEmptyString) => {
                        Ok(expanded_parameter)
                    }
                    _ => {
                        let expanded_default_value =
                            String::from(self.expand_parameter_word(default_value).await?);
                        self.assign_to_parameter(&parameter, expanded_default_value.clone())?;
                        Ok(Expansion::from(expanded_default_value))
                    }
                }
            }
            ParameterExpr::IndicateErrorIfNullOrUnset {
                parameter,
                test_type,
                error_message,
            } => {
                let expanded_parameter = self.expand_parameter(&parameter)?;

                match (test_type, expanded_parameter.classify()) {
                    (_, ParameterState::NonZeroLength)
                    | (ParameterTestType::Unset, ParameterState::DefinedEmptyString) => {
                        Ok(expanded_parameter)
                    }
                    _ => {
                        let message = match &error_message {
                            Some(msg) => self.basic_expand_to_str(msg).await?,
                            None => String::from("parameter null or not set"),
                        };
                        Err(error::Error::CheckedExpansionError(std::format!(
                            "{parameter}: {message}"
                        )))
                    }
                }
            }
            ParameterExpr::UseAlternativeValue {
                parameter,
                test_type,
                alternative_value,
            } => {
                let expanded_parameter = self.expand_parameter(&parameter)?;
                let alternative_value = alternative_value.as_deref().unwrap_or("");

                match (test_type, expanded_parameter.classify()) {
                    (_, ParameterState::NonZeroLength)
                    | (ParameterTestType::Unset, ParameterState::DefinedEmptyString) => {
                        Ok(self.expand_parameter_word(alternative_value).await?)
                    }
                    _ => Ok(Expansion::from(String::new())),
                }
            }
            ParameterExpr::ParameterLength { parameter } => {
                let expansion = self.expand_parameter(&parameter)?;
                let len = String::from(expansion).chars().count();
                Ok(Expansion::from(len.to_string()))
            }
            ParameterExpr::RemoveSmallestSuffixPattern { parameter, pattern } => {
                let value = String::from(self.expand_parameter(&parameter)?);
                let pattern = self.basic_expand_opt_pattern(pattern.as_ref()).await?;
                let result = patterns::remove_smallest_matching_suffix(value.as_str(), &pattern)?;
                Ok(Expansion::from(result.to_owned()))
            }
            ParameterExpr::RemoveLargestSuffixPattern { parameter, pattern } => {
                let value = String::from(self.expand_parameter(&parameter)?);
                let pattern = self.basic_expand_opt_pattern(pattern.as_ref()).await?;
                let result = patterns::remove_largest_matching_suffix(value.as_str(), &pattern)?;
                Ok(Expansion::from(result.to_owned()))
            }
            ParameterExpr::RemoveSmallestPrefixPattern { parameter, pattern } => {
                let value = String::from(self.expand_parameter(&parameter)?);
                let pattern = self.basic_expand_opt_pattern(pattern.as_ref()).await?;
                let result = patterns::remove_smallest_matching_prefix(value.as_str(), &pattern)?;
                Ok(Expansion::from(result.to_owned()))
            }
            ParameterExpr::RemoveLargestPrefixPattern { parameter, pattern } => {
                let value = String::from(self.expand_parameter(&parameter)?);
                let pattern = self.basic_expand_opt_pattern(pattern.as_ref()).await?;
                let result = patterns::remove_largest_matching_prefix(value.as_str(), &pattern)?;
                Ok(Expansion::from(result.to_owned()))
            }
        }
    }

    fn expand_parameter(&mut self, parameter: &Parameter) -> Result<Expansion, error::Error> {
        match parameter {
            Parameter::Positional(p) => {
                let index = *p as usize;
                match self
                    .shell
                    .positional_parameters
                    .get(index.saturating_sub(1))
                {
                    Some(value) if index >= 1 => {
                        Ok(Expansion::from(ExpansionPiece::Splittable(value.clone())))
                    }
                    _ => Ok(Expansion::undefined()),
                }
            }
            Parameter::Special(special) => self.expand_special_parameter(special),
            Parameter::Named(name) => match self.shell.env.get_str(name) {
                Some(value) => Ok(Expansion::from(ExpansionPiece::Splittable(
                    value.to_owned(),
                ))),
                None => Ok(Expansion::undefined()),
            },
        }
    }

    fn expand_special_parameter(
        &mut self,
        parameter: &SpecialParameter,
    ) -> Result<Expansion, error::Error> {
        match parameter {
            SpecialParameter::AllPositionalParameters { concatenate } => {
                let fields: Vec<WordField> = self
                    .shell
                    .positional_parameters
                    .iter()
                    .map(|param| WordField::from(ExpansionPiece::Splittable(param.clone())))
                    .collect();

                Ok(Expansion {
                    fields,
                    concatenate: *concatenate,
                    undefined: false,
                })
            }
            SpecialParameter::PositionalParameterCount => Ok(Expansion::from(
                self.shell.positional_parameters.len().to_string(),
            )),
            SpecialParameter::LastExitStatus => {
                Ok(Expansion::from(self.shell.last_exit_status.to_string()))
            }
            SpecialParameter::CurrentOptionFlags => {
                Ok(Expansion::from(self.shell.options.option_flags_str()))
            }
            SpecialParameter::ProcessId => Ok(Expansion::from(self.shell.process_id.to_string())),
            SpecialParameter::LastBackgroundProcessId => {
                let value = self
                    .shell
                    .jobs
                    .last_background_pid()
                    .map_or_else(String::new, |pid| pid.to_string());
                Ok(Expansion::from(value))
            }
            SpecialParameter::ShellName => Ok(Expansion::from(
                self.shell.shell_name.clone().unwrap_or_default(),
            )),
        }
    }

    fn assign_to_parameter(
        &mut self,
        parameter: &Parameter,
        value: String,
    ) -> Result<(), error::Error> {
        match parameter {
            Parameter::Named(name) => {
                self.shell
                    .env
                    .update_or_add(name, value, env::EnvironmentScope::Global)?;

                if self.shell.options.export_variables_on_modification {
                    if let Some((_, var)) = self.shell.env.get_mut(name) {
                        var.export();
                    }
                }

                Ok(())
            }
            Parameter::Positional(_) | Parameter::Special(_) => {
                Err(error::Error::CannotAssignToSpecialParameter)
            }
        }
    }
}

fn coalesce_expansions(expansions: Vec<Expansion>) -> Expansion {
    expansions
        .into_iter()
        .fold(Expansion::default(), |mut acc, expansion| {
            for (i, field) in expansion.fields.into_iter().enumerate() {
                // Concatenate the first field of this expansion with the last
                // one accumulated so far; the rest start their own fields.
                if i == 0 {
                    if let Some(last_acc_field) = acc.fields.last_mut() {
                        let WordField(mut pieces) = field;
                        last_acc_field.0.append(&mut pieces);
                        continue;
                    }
                }

                acc.fields.push(field);
            }

            acc.undefined = acc.undefined || expansion.undefined;

            acc
        })
}

/// Assigns a value to a variable named by an expanded word, following the
/// shell's allexport semantics.
///
/// # Arguments
///
/// * `shell` - The shell to assign within.
/// * `name` - The name of the variable.
/// * `value` - The value to assign.
pub(crate) fn assign_to_named_variable(
    shell: &mut Shell,
    name: &str,
    value: String,
) -> Result<(), error::Error> {
    if !env::valid_variable_name(name) {
        return Err(error::Error::CannotAssignToSpecialParameter);
    }

    shell
        .env
        .update_or_add(name, value, env::EnvironmentScope::Global)?;

    if shell.options.export_variables_on_modification {
        if let Some((_, var)) = shell.env.get_mut(name) {
            var.export();
        }
    }

    Ok(())
}

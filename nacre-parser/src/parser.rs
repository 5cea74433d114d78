//! Parses token streams into shell program syntax trees.

use crate::ast::{self, SeparatorOperator};
use crate::error;
use crate::tokenizer::{Token, TokenEndReason, TokenLocation, Tokenizer, TokenizerOptions, Tokens};

/// Options used to control the behavior of the parser.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ParserOptions {
    /// Whether or not to enable strict POSIX compliance mode.
    pub posix_mode: bool,
}

impl ParserOptions {
    /// Returns the tokenizer options implied by these parser options.
    pub const fn tokenizer_options(&self) -> TokenizerOptions {
        TokenizerOptions {
            posix_mode: self.posix_mode,
        }
    }
}

/// Implements parsing for shell programs.
pub struct Parser<R: std::io::BufRead> {
    /// The reader to use for input.
    reader: R,
    /// Parsing options.
    options: ParserOptions,
}

impl<R: std::io::BufRead> Parser<R> {
    /// Returns a new parser instance.
    ///
    /// # Arguments
    ///
    /// * `reader` - The reader to use for input.
    /// * `options` - The options to use when parsing.
    pub fn new(reader: R, options: &ParserOptions) -> Self {
        Self {
            reader,
            options: options.clone(),
        }
    }

    /// Parses the input into an abstract syntax tree (AST) of a shell program.
    pub fn parse_program(&mut self) -> Result<ast::Program, error::ParseError> {
        //
        // References:
        //   * https://pubs.opengroup.org/onlinepubs/9699919799/utilities/V3_chap02.html
        //
        let tokens = self.tokenize()?;
        parse_tokens(&tokens, &self.options)
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, error::ParseError> {
        let mut tokenizer = Tokenizer::new(&mut self.reader, &self.options.tokenizer_options());

        tracing::debug!(target: "tokenize", "tokenizing...");

        let mut tokens = vec![];
        loop {
            let result = match tokenizer.next_token() {
                Ok(result) => result,
                Err(e) => {
                    return Err(error::ParseError::Tokenizing {
                        inner: e,
                        position: tokenizer.current_location(),
                    });
                }
            };

            let reason = result.reason;
            if let Some(token) = result.token {
                tokens.push(token);
            }

            if matches!(reason, TokenEndReason::EndOfInput) {
                break;
            }
        }

        tracing::debug!(target: "tokenize", "  => {} token(s)", tokens.len());

        Ok(tokens)
    }
}

/// Parses a sequence of tokens into the abstract syntax tree (AST) of a shell program.
///
/// # Arguments
///
/// * `tokens` - The tokens to parse.
/// * `options` - The options to use when parsing.
pub fn parse_tokens(
    tokens: &Vec<Token>,
    options: &ParserOptions,
) -> Result<ast::Program, error::ParseError> {
    let parse_result = token_parser::program(&Tokens { tokens }, options);

    match parse_result {
        Ok(program) => {
            tracing::debug!(target: "parse", "PROG: {:?}", program);
            Ok(program)
        }
        Err(parse_error) => {
            tracing::debug!(target: "parse", "parse error: {:?}", parse_error);
            Err(error::convert_peg_parse_error(
                &parse_error,
                tokens.as_slice(),
            ))
        }
    }
}

impl peg::Parse for Tokens<'_> {
    type PositionRepr = usize;

    #[inline]
    fn start(&self) -> usize {
        0
    }

    #[inline]
    fn is_eof(&self, p: usize) -> bool {
        p >= self.tokens.len()
    }

    #[inline]
    fn position_repr(&self, p: usize) -> Self::PositionRepr {
        p
    }
}

impl<'a> peg::ParseElem<'a> for Tokens<'a> {
    type Element = &'a Token;

    #[inline]
    fn parse_elem(&'a self, pos: usize) -> peg::RuleResult<Self::Element> {
        match self.tokens.get(pos) {
            Some(c) => peg::RuleResult::Matched(pos + 1, c),
            None => peg::RuleResult::Failed,
        }
    }
}

peg::parser! {
    grammar token_parser<'a>(parser_options: &ParserOptions) for Tokens<'a> {
        pub(crate) rule program() -> ast::Program =
            linebreak() c:complete_commands() linebreak() { ast::Program { complete_commands: c } } /
            linebreak() { ast::Program { complete_commands: vec![] } }

        rule complete_commands() -> Vec<ast::CompoundList> =
            c:complete_command() ++ newline_list()

        rule complete_command() -> ast::CompoundList =
            first:and_or() remainder:(s:separator_op() l:and_or() { (s, l) })* last_sep:separator_op()? {
                let mut and_ors = vec![first];
                let mut seps = vec![];

                for (sep, ao) in remainder {
                    seps.push(sep);
                    and_ors.push(ao);
                }

                // N.B. We default to synchronous if no separator op is given.
                seps.push(last_sep.unwrap_or(SeparatorOperator::Sequence));

                let items = and_ors
                    .into_iter()
                    .zip(seps)
                    .map(|(ao, sep)| ast::CompoundListItem(ao, sep))
                    .collect();

                ast::CompoundList(items)
            }

        rule and_or() -> ast::AndOrList =
            first:pipeline() additional:_and_or_item()* { ast::AndOrList { first, additional } }

        rule _and_or_item() -> ast::AndOr =
            op:_and_or_op() linebreak() p:pipeline() { op(p) }

        rule _and_or_op() -> fn(ast::Pipeline) -> ast::AndOr =
            specific_operator("&&") { ast::AndOr::And } /
            specific_operator("||") { ast::AndOr::Or }

        rule pipeline() -> ast::Pipeline =
            bang:bang()? seq:pipe_sequence() { ast::Pipeline { bang: bang.is_some(), seq } }

        rule bang() -> bool = specific_word("!") { true }

        rule pipe_sequence() -> Vec<ast::Command> =
            c:command() ++ (specific_operator("|") linebreak()) { c }

        // N.B. The function definition branch comes first to avoid ambiguity
        // with a simple command whose first word contains parentheses.
        rule command() -> ast::Command =
            f:function_definition() { ast::Command::Function(f) } /
            c:simple_command() { ast::Command::Simple(c) } /
            c:compound_command() r:redirect_list()? { ast::Command::Compound(c, r) } /
            expected!("command")

        rule compound_command() -> ast::CompoundCommand =
            b:brace_group() { ast::CompoundCommand::BraceGroup(b) } /
            s:subshell() { ast::CompoundCommand::Subshell(s) } /
            f:for_clause() { ast::CompoundCommand::ForClause(f) } /
            c:case_clause() { ast::CompoundCommand::CaseClause(c) } /
            i:if_clause() { ast::CompoundCommand::IfClause(i) } /
            w:while_clause() { ast::CompoundCommand::WhileClause(w) } /
            u:until_clause() { ast::CompoundCommand::UntilClause(u) } /
            expected!("compound command")

        rule subshell() -> ast::SubshellCommand =
            specific_operator("(") list:compound_list() specific_operator(")") {
                ast::SubshellCommand(list)
            }

        rule compound_list() -> ast::CompoundList =
            linebreak() first:and_or() remainder:(s:separator() l:and_or() { (s, l) })* last_sep:separator()? {
                let mut and_ors = vec![first];
                let mut seps = vec![];

                for (sep, ao) in remainder {
                    seps.push(sep.unwrap_or(SeparatorOperator::Sequence));
                    and_ors.push(ao);
                }

                // N.B. We default to synchronous if no separator op is given.
                let last_sep = last_sep.unwrap_or(None);
                seps.push(last_sep.unwrap_or(SeparatorOperator::Sequence));

                let items = and_ors
                    .into_iter()
                    .zip(seps)
                    .map(|(ao, sep)| ast::CompoundListItem(ao, sep))
                    .collect();

                ast::CompoundList(items)
            }

        rule for_clause() -> ast::ForClauseCommand =
            specific_word("for") n:name() linebreak() _in() w:wordlist()? sequential_sep() d:do_group() {
                ast::ForClauseCommand { variable_name: n.to_owned(), values: w, body: d }
            } /
            specific_word("for") n:name() sequential_sep()? d:do_group() {
                ast::ForClauseCommand { variable_name: n.to_owned(), values: None, body: d }
            }

        rule name() -> &'input str =
            w:[Token::Word(_, _)] { w.to_str() }

        rule _in() -> () =
            specific_word("in") { }

        rule wordlist() -> Vec<ast::Word> =
            (w:word() { ast::Word::from(w) })+

        rule case_clause() -> ast::CaseClauseCommand =
            specific_word("case") w:word() linebreak() _in() linebreak() first_items:case_item()* last_item:case_item_ns()? specific_word("esac") {
                let mut cases = first_items;

                if let Some(last_item) = last_item {
                    cases.push(last_item);
                }

                ast::CaseClauseCommand { value: ast::Word::from(w), cases }
            }

        rule case_item_ns() -> ast::CaseItem =
            specific_operator("(")? p:pattern() specific_operator(")") c:compound_list() {
                ast::CaseItem { patterns: p, cmd: Some(c) }
            } /
            specific_operator("(")? p:pattern() specific_operator(")") linebreak() {
                ast::CaseItem { patterns: p, cmd: None }
            }

        rule case_item() -> ast::CaseItem =
            specific_operator("(")? p:pattern() specific_operator(")") linebreak() specific_operator(";;") linebreak() {
                ast::CaseItem { patterns: p, cmd: None }
            } /
            specific_operator("(")? p:pattern() specific_operator(")") c:compound_list() specific_operator(";;") linebreak() {
                ast::CaseItem { patterns: p, cmd: Some(c) }
            }

        rule pattern() -> Vec<ast::Word> =
            (w:word() { ast::Word::from(w) }) ++ specific_operator("|")

        rule if_clause() -> ast::IfClauseCommand =
            specific_word("if") condition:compound_list() specific_word("then") then:compound_list() elses:else_part()? specific_word("fi") {
                ast::IfClauseCommand {
                    condition,
                    then,
                    elses,
                }
            }

        rule else_part() -> Vec<ast::ElseClause> =
            cs:_conditional_else_part()+ u:_unconditional_else_part()? {
                let mut parts = cs;
                if let Some(uncond) = u {
                    parts.push(uncond);
                }
                parts
            } /
            e:_unconditional_else_part() { vec![e] }

        rule _conditional_else_part() -> ast::ElseClause =
            specific_word("elif") condition:compound_list() specific_word("then") body:compound_list() {
                ast::ElseClause { condition: Some(condition), body }
            }

        rule _unconditional_else_part() -> ast::ElseClause =
            specific_word("else") body:compound_list() {
                ast::ElseClause { condition: None, body }
             }

        rule while_clause() -> ast::WhileOrUntilClauseCommand =
            specific_word("while") c:compound_list() d:do_group() { ast::WhileOrUntilClauseCommand(c, d) }

        rule until_clause() -> ast::WhileOrUntilClauseCommand =
            specific_word("until") c:compound_list() d:do_group() { ast::WhileOrUntilClauseCommand(c, d) }

        rule function_definition() -> ast::FunctionDefinition =
            fname:fname() specific_operator("(") specific_operator(")") linebreak() body:function_body() {
                ast::FunctionDefinition { fname: fname.to_owned(), body }
            } /
            expected!("function definition")

        rule function_body() -> ast::FunctionBody =
            c:compound_command() r:redirect_list()? { ast::FunctionBody(c, r) }

        rule fname() -> &'input str =
            // Don't allow it to end with an equals sign, to avoid misinterpreting
            // assignment words.
            w:[Token::Word(word, _) if !word.ends_with('=')] { w.to_str() }

        rule brace_group() -> ast::BraceGroupCommand =
            specific_word("{") list:compound_list() specific_word("}") {
                ast::BraceGroupCommand(list)
            }

        rule do_group() -> ast::DoGroupCommand =
            specific_word("do") list:compound_list() specific_word("done") {
                ast::DoGroupCommand(list)
            }

        rule simple_command() -> ast::SimpleCommand =
            prefix:cmd_prefix() word_and_suffix:(word_or_name:cmd_word() suffix:cmd_suffix()? { (word_or_name, suffix) })? {
                match word_and_suffix {
                    Some((word_or_name, suffix)) => {
                        ast::SimpleCommand { prefix: Some(prefix), word_or_name: Some(ast::Word::from(word_or_name)), suffix }
                    }
                    None => {
                        ast::SimpleCommand { prefix: Some(prefix), word_or_name: None, suffix: None }
                    }
                }
            } /
            word_or_name:cmd_name() suffix:cmd_suffix()? {
                ast::SimpleCommand { prefix: None, word_or_name: Some(ast::Word::from(word_or_name)), suffix } } /
            expected!("simple command")

        rule cmd_name() -> &'input Token =
            non_reserved_word()

        rule cmd_word() -> &'input Token =
            !assignment_word() w:non_reserved_word() { w }

        rule cmd_prefix() -> ast::CommandPrefix =
            p:(
                i:io_redirect() { ast::CommandPrefixOrSuffixItem::IoRedirect(i) } /
                assignment_and_word:assignment_word() {
                    let (assignment, word) = assignment_and_word;
                    ast::CommandPrefixOrSuffixItem::AssignmentWord(assignment, word)
                }
            )+ { ast::CommandPrefix(p) }

        rule cmd_suffix() -> ast::CommandSuffix =
            s:(
                i:io_redirect() {
                    ast::CommandPrefixOrSuffixItem::IoRedirect(i)
                } /
                assignment_and_word:assignment_word() {
                    let (assignment, word) = assignment_and_word;
                    ast::CommandPrefixOrSuffixItem::AssignmentWord(assignment, word)
                } /
                w:word() {
                    ast::CommandPrefixOrSuffixItem::Word(ast::Word::from(w))
                }
            )+ { ast::CommandSuffix(s) }

        rule redirect_list() -> ast::RedirectList =
            r:io_redirect()+ { ast::RedirectList(r) } /
            expected!("redirect list")

        rule io_redirect() -> ast::IoRedirect =
            n:io_number()? f:io_file() {
                    let (kind, target) = f;
                    ast::IoRedirect::File(n, kind, target)
                } /
            n:io_number()? h:io_here() { ast::IoRedirect::HereDocument(n, h) } /
            expected!("I/O redirect")

        rule io_file() -> (ast::IoFileRedirectKind, ast::IoFileRedirectTarget) =
            specific_operator("<")  f:io_filename() { (ast::IoFileRedirectKind::Read, f) } /
            specific_operator("<&") f:io_fd_duplication_source() { (ast::IoFileRedirectKind::DuplicateInput, f) } /
            specific_operator(">")  f:io_filename() { (ast::IoFileRedirectKind::Write, f) } /
            specific_operator(">&") f:io_fd_duplication_source() { (ast::IoFileRedirectKind::DuplicateOutput, f) } /
            specific_operator(">>") f:io_filename() { (ast::IoFileRedirectKind::Append, f) } /
            specific_operator("<>") f:io_filename() { (ast::IoFileRedirectKind::ReadAndWrite, f) } /
            specific_operator(">|") f:io_filename() { (ast::IoFileRedirectKind::Clobber, f) }

        rule io_fd_duplication_source() -> ast::IoFileRedirectTarget =
            w:word() { ast::IoFileRedirectTarget::Duplicate(ast::Word::from(w)) }

        rule io_filename() -> ast::IoFileRedirectTarget =
            f:filename() { ast::IoFileRedirectTarget::Filename(ast::Word::from(f)) }

        rule filename() -> &'input Token =
            word()

        rule io_here() -> ast::IoHereDocument =
           specific_operator("<<-") here_tag:here_tag() doc:[_] _closing_tag:here_tag() {
                let requires_expansion = !here_tag.to_str().contains(['\'', '"', '\\']);
                ast::IoHereDocument {
                    remove_tabs: true,
                    requires_expansion,
                    here_end: ast::Word::from(here_tag),
                    doc: ast::Word::from(doc)
                }
            } /
            specific_operator("<<") here_tag:here_tag() doc:[_] _closing_tag:here_tag() {
                let requires_expansion = !here_tag.to_str().contains(['\'', '"', '\\']);
                ast::IoHereDocument {
                    remove_tabs: false,
                    requires_expansion,
                    here_end: ast::Word::from(here_tag),
                    doc: ast::Word::from(doc)
                }
            }

        rule here_tag() -> &'input Token =
            word()

        rule newline_list() -> () =
            newline()+ {}

        rule linebreak() -> () =
            quiet! {
                newline()* {}
            }

        rule separator_op() -> ast::SeparatorOperator =
            specific_operator("&") { ast::SeparatorOperator::Async } /
            specific_operator(";") { ast::SeparatorOperator::Sequence }

        rule separator() -> Option<ast::SeparatorOperator> =
            s:separator_op() linebreak() { Some(s) } /
            newline_list() { None }

        rule sequential_sep() -> () =
            specific_operator(";") linebreak() /
            newline_list()

        //
        // Token interpretation
        //

        rule non_reserved_word() -> &'input Token =
            !reserved_word() w:word() { w }

        rule word() -> &'input Token =
            [Token::Word(_, _)]

        rule reserved_word() -> &'input Token =
            [Token::Word(w, _) if matches!(w.as_str(),
                "!" |
                "{" |
                "}" |
                "case" |
                "do" |
                "done" |
                "elif" |
                "else" |
                "esac" |
                "fi" |
                "for" |
                "if" |
                "in" |
                "then" |
                "until" |
                "while"
            )]

        rule newline() -> () = quiet! {
            specific_operator("\n") {}
        }

        pub(crate) rule assignment_word() -> (ast::Assignment, ast::Word) =
            [Token::Word(w, _)] {?
                let parsed = parse_assignment_word(w.as_str())?;
                Ok((parsed, ast::Word::new(w)))
            }

        // N.B. An I/O number must be a string of only digits, and it must be
        // followed by a '<' or '>' character (but not consume them). There must
        // also have been no space between the number and the redirection
        // operator; we infer that by looking at the tokens' locations.
        rule io_number() -> u32 =
            [Token::Word(w, num_loc) if w.chars().all(|c: char| c.is_ascii_digit())]
            &([Token::Operator(o, redir_loc) if
                    o.starts_with(['<', '>']) &&
                    locations_are_contiguous(num_loc, redir_loc)]) {?

                w.parse().or(Err("io_number u32"))
            }

        //
        // Helpers
        //
        rule specific_operator(expected: &str) -> &'input Token =
            [Token::Operator(w, _) if w.as_str() == expected]

        rule specific_word(expected: &str) -> &'input Token =
            [Token::Word(w, _) if w.as_str() == expected]
    }
}

peg::parser! {
    grammar assignments() for str {
        pub(crate) rule name_and_scalar_value() -> ast::Assignment =
            name:scalar_name() "=" value:scalar_value() {
                ast::Assignment { name: name.to_owned(), value }
            }

        rule scalar_name() -> &'input str =
            $(alpha_or_underscore() non_first_variable_char()*)

        rule non_first_variable_char() -> () =
            ['_' | '0'..='9' | 'a'..='z' | 'A'..='Z'] {}

        rule alpha_or_underscore() -> () =
            ['_' | 'a'..='z' | 'A'..='Z'] {}

        rule scalar_value() -> ast::Word =
            v:$([_]*) { ast::Word::new(v) }
    }
}

fn parse_assignment_word(word: &str) -> Result<ast::Assignment, &'static str> {
    let parse_result = assignments::name_and_scalar_value(word);
    parse_result.map_err(|_| "not assignment word")
}

const fn locations_are_contiguous(loc_left: &TokenLocation, loc_right: &TokenLocation) -> bool {
    loc_left.end.index == loc_right.start.index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_str;
    use anyhow::Result;

    fn parse_str(input: &str) -> Result<ast::Program> {
        let tokens = tokenize_str(input)?;
        Ok(parse_tokens(&tokens, &ParserOptions::default())?)
    }

    #[test]
    fn parse_empty_program() -> Result<()> {
        let program = parse_str("")?;
        assert!(program.is_empty());

        let program = parse_str("# only a comment\n")?;
        assert!(program.is_empty());

        Ok(())
    }

    #[test]
    fn parse_simple_command() -> Result<()> {
        let program = parse_str("echo hello world")?;
        assert_eq!(program.complete_commands.len(), 1);
        assert_eq!(program.to_string(), "echo hello world");
        Ok(())
    }

    #[test]
    fn parse_and_or_list() -> Result<()> {
        let program = parse_str("false && echo x || echo y")?;
        assert_eq!(program.to_string(), "false && echo x || echo y");
        Ok(())
    }

    #[test]
    fn parse_pipeline_with_bang() -> Result<()> {
        let program = parse_str("! cat file | wc -l")?;
        assert_eq!(program.to_string(), "! cat file | wc -l");
        Ok(())
    }

    #[test]
    fn parse_background_command() -> Result<()> {
        let program = parse_str("sleep 5 &")?;
        let list = &program.complete_commands[0];
        assert!(matches!(list.0[0].1, SeparatorOperator::Async));
        Ok(())
    }

    #[test]
    fn parse_if_clause() -> Result<()> {
        let program = parse_str("if true; then echo yes; elif false; then echo maybe; else echo no; fi")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Compound(ast::CompoundCommand::IfClause(if_clause), _) => {
                assert_eq!(if_clause.elses.as_ref().map(Vec::len), Some(2));
            }
            _ => panic!("expected if clause, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_for_clause() -> Result<()> {
        let program = parse_str("for i in a b c; do echo $i; done")?;
        assert_eq!(program.to_string(), "for i in a b c; do echo $i; done");
        Ok(())
    }

    #[test]
    fn parse_for_clause_without_words() -> Result<()> {
        let program = parse_str("for arg; do echo $arg; done")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Compound(ast::CompoundCommand::ForClause(for_clause), _) => {
                assert!(for_clause.values.is_none());
            }
            _ => panic!("expected for clause, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_case_clause() -> Result<()> {
        let program = parse_str("case x in\nx) echo y;;\n*) echo z;;\nesac")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Compound(ast::CompoundCommand::CaseClause(case_clause), _) => {
                assert_eq!(case_clause.cases.len(), 2);
            }
            _ => panic!("expected case clause, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_case_clause_with_unterminated_last_item() -> Result<()> {
        let program = parse_str("case x in\nx)\n    echo y\nesac")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        assert!(matches!(
            cmd,
            ast::Command::Compound(ast::CompoundCommand::CaseClause(_), _)
        ));
        Ok(())
    }

    #[test]
    fn parse_subshell_and_brace_group() -> Result<()> {
        parse_str("( cd /tmp; pwd )")?;
        parse_str("{ echo a; echo b; }")?;
        Ok(())
    }

    #[test]
    fn parse_function_definition() -> Result<()> {
        let program = parse_str("greet() { echo hi; }")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Function(def) => assert_eq!(def.fname, "greet"),
            _ => panic!("expected function definition, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_redirections() -> Result<()> {
        let program = parse_str("cmd > out 2>&1")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Simple(simple) => {
                let suffix = simple.suffix.as_ref().unwrap();
                assert_eq!(suffix.0.len(), 2);
                match &suffix.0[1] {
                    ast::CommandPrefixOrSuffixItem::IoRedirect(ast::IoRedirect::File(
                        Some(2),
                        ast::IoFileRedirectKind::DuplicateOutput,
                        ast::IoFileRedirectTarget::Duplicate(word),
                    )) => assert_eq!(word.value, "1"),
                    item => panic!("expected 2>&1, got: {item:?}"),
                }
            }
            _ => panic!("expected simple command, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_io_number_requires_adjacency() -> Result<()> {
        // With whitespace in between, '2' is an argument, not an io number.
        let program = parse_str("cmd 2 > out")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Simple(simple) => {
                let suffix = simple.suffix.as_ref().unwrap();
                assert!(matches!(
                    suffix.0[0],
                    ast::CommandPrefixOrSuffixItem::Word(_)
                ));
                assert!(matches!(
                    suffix.0[1],
                    ast::CommandPrefixOrSuffixItem::IoRedirect(ast::IoRedirect::File(
                        None,
                        ast::IoFileRedirectKind::Write,
                        _
                    ))
                ));
            }
            _ => panic!("expected simple command, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_here_document() -> Result<()> {
        let program = parse_str("cat <<EOF\nhello $USER\nEOF\n")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Simple(simple) => {
                let suffix = simple.suffix.as_ref().unwrap();
                match &suffix.0[0] {
                    ast::CommandPrefixOrSuffixItem::IoRedirect(ast::IoRedirect::HereDocument(
                        None,
                        doc,
                    )) => {
                        assert!(doc.requires_expansion);
                        assert_eq!(doc.doc.value, "hello $USER\n");
                    }
                    item => panic!("expected here document, got: {item:?}"),
                }
            }
            _ => panic!("expected simple command, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_here_document_with_quoted_tag() -> Result<()> {
        let program = parse_str("cat <<'EOF'\nhello $USER\nEOF\n")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Simple(simple) => match &simple.suffix.as_ref().unwrap().0[0] {
                ast::CommandPrefixOrSuffixItem::IoRedirect(ast::IoRedirect::HereDocument(
                    None,
                    doc,
                )) => assert!(!doc.requires_expansion),
                item => panic!("expected here document, got: {item:?}"),
            },
            _ => panic!("expected simple command, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_assignment_prefix() -> Result<()> {
        let program = parse_str("A=1 B=2 env")?;
        let cmd = &program.complete_commands[0].0[0].0.first.seq[0];
        match cmd {
            ast::Command::Simple(simple) => {
                let prefix = simple.prefix.as_ref().unwrap();
                assert_eq!(prefix.0.len(), 2);
                assert!(matches!(
                    &prefix.0[0],
                    ast::CommandPrefixOrSuffixItem::AssignmentWord(a, _) if a.name == "A"
                ));
            }
            _ => panic!("expected simple command, got: {cmd:?}"),
        }
        Ok(())
    }

    #[test]
    fn incomplete_input_reports_incomplete() {
        let tokens = tokenize_str("echo one &&\necho two").unwrap();
        // A trailing && with nothing after it should fail as incomplete.
        let tokens_partial = tokenize_str("echo one &&").unwrap();
        let err = parse_tokens(&tokens_partial, &ParserOptions::default()).unwrap_err();
        assert!(err.is_incomplete());

        // The full input should parse.
        assert!(parse_tokens(&tokens, &ParserOptions::default()).is_ok());
    }
}

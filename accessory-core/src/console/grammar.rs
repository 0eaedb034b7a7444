#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the bench console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens and walks the
//! [`catalog`](super::catalog) to build structured commands.

use super::catalog::{self, CommandTag, HOOK_BEHAVIORS, HOOK_TARGETS, Node, ValueSpec};
use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use crate::characteristic::{CharacteristicId, CharacteristicValue};
use crate::sequencer::reset::ConfigTarget;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;
const MAX_ARGUMENTS: usize = 4;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Equals sign for key/value assignments.
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    UnknownCharacteristic {
        span: Range<usize>,
        lexeme: &'a str,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::UnknownCharacteristic { span, lexeme } => {
                write!(f, "unknown characteristic `{lexeme}` at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn unknown_characteristic(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownCharacteristic {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Press(PressCommand),
    Sensor(u16),
    Write(WriteCommand),
    Identify,
    Reset,
    Advance(Duration),
    Config(ConfigCommand<'a>),
    Hook(HookCommand),
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PressCommand {
    pub hold: Duration,
    /// Extra level flips injected at both edges.
    pub bounce: Option<u32>,
}

/// Value literal accepted by `write`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteValue {
    Bool(bool),
    Int(i32),
}

impl WriteValue {
    #[must_use]
    pub fn to_value(self) -> CharacteristicValue {
        match self {
            WriteValue::Bool(value) => CharacteristicValue::Bool(value),
            WriteValue::Int(value) => CharacteristicValue::Int(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteCommand {
    pub characteristic: CharacteristicId,
    pub value: WriteValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigCommand<'a> {
    pub option: &'a str,
    pub value: u32,
}

/// Scripted answer of a config-clear hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookBehavior {
    Confirm,
    Fail,
    Busy,
    /// Accepts the request and never confirms it.
    Pending,
}

impl fmt::Display for HookBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookBehavior::Confirm => f.write_str("ok"),
            HookBehavior::Fail => f.write_str("fail"),
            HookBehavior::Busy => f.write_str("busy"),
            HookBehavior::Pending => f.write_str("pending"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookCommand {
    pub target: ConfigTarget,
    pub behavior: HookBehavior,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span: start..end,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        if let Some(spec) = catalog::find(command_token.lexeme) {
            let mut state = CommandState::new(spec.tag);
            parse_node(spec.grammar, input, &mut state)?;
            state.finish()
        } else {
            *input = snapshot;
            Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )))
        }
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::Value { value, next } => {
            let argument = parse_value(input, *value)?;
            state.push(argument)?;
            parse_node(next, input, state)
        }
        Node::OptionalAssignment { key, next } => {
            if let Some((token, rest)) = input.split_first()
                && token.kind == TokenKind::Ident
            {
                if !token.lexeme.eq_ignore_ascii_case(key) {
                    return Err(ErrMode::Backtrack(GrammarError::unexpected(key, Some(token))));
                }
                *input = rest;
                let value = parse_assignment_value(input)?;
                state.push(Argument::Assignment {
                    name: token.lexeme,
                    value,
                })?;
            }
            parse_node(next, input, state)
        }
        Node::Topic { next } => {
            parse_topic(input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_topic<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.topic = Some(token.lexeme);
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(()),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "identifier",
            Some(token),
        ))),
        None => Ok(()),
    }
}

fn parse_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    spec: ValueSpec,
) -> Result<Argument<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match spec {
        ValueSpec::Duration => {
            let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
            let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
            Ok(Argument::Duration(duration))
        }
        ValueSpec::Reading => {
            let token = expect_kind(TokenKind::Integer, "reading").parse_next(input)?;
            let reading = token
                .lexeme
                .parse::<u16>()
                .map_err(|_| ErrMode::Cut(GrammarError::invalid_integer(&token)))?;
            Ok(Argument::Reading(reading))
        }
        ValueSpec::Characteristic => {
            let token = expect_kind(TokenKind::Ident, "characteristic").parse_next(input)?;
            CharacteristicId::from_name(token.lexeme)
                .map(Argument::Characteristic)
                .ok_or_else(|| ErrMode::Cut(GrammarError::unknown_characteristic(&token)))
        }
        ValueSpec::CharacteristicValue => parse_write_value(input).map(Argument::Value),
        ValueSpec::Assignment { names } => {
            let token = expect_kind(TokenKind::Ident, "option name").parse_next(input)?;
            let Some(name) = names
                .iter()
                .copied()
                .find(|name| name.eq_ignore_ascii_case(token.lexeme))
            else {
                return Err(ErrMode::Cut(GrammarError::unexpected(
                    "option name",
                    Some(&token),
                )));
            };
            let value = parse_assignment_value(input)?;
            Ok(Argument::Assignment { name, value })
        }
        ValueSpec::Keyword { keywords } => {
            let label = keywords.first().copied().unwrap_or("keyword");
            let token = expect_kind(TokenKind::Ident, label).parse_next(input)?;
            keywords
                .iter()
                .copied()
                .find(|keyword| keyword.eq_ignore_ascii_case(token.lexeme))
                .map(Argument::Keyword)
                .ok_or_else(|| ErrMode::Backtrack(GrammarError::unexpected(label, Some(&token))))
        }
    }
}

fn parse_write_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
) -> Result<WriteValue, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    const LABEL: &str = "true, false or integer";
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Integer => {
            let value = parse_integer::<i32>(token).map_err(ErrMode::Cut)?;
            *input = rest;
            Ok(WriteValue::Int(value))
        }
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            let Some(value) = bool_keyword(token.lexeme) else {
                return Err(ErrMode::Backtrack(GrammarError::unexpected(
                    LABEL,
                    Some(token),
                )));
            };
            *input = rest;
            Ok(WriteValue::Bool(value))
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            LABEL,
            other.map(|(token, _)| token),
        ))),
    }
}

fn parse_assignment_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
) -> Result<u32, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let _ = expect_kind(TokenKind::Equals, "=").parse_next(input)?;
    let token = expect_kind(TokenKind::Integer, "integer").parse_next(input)?;
    parse_integer::<u32>(&token).map_err(ErrMode::Cut)
}

fn bool_keyword(word: &str) -> Option<bool> {
    const TRUE: [&str; 2] = ["true", "on"];
    const FALSE: [&str; 2] = ["false", "off"];
    if TRUE.iter().any(|candidate| candidate.eq_ignore_ascii_case(word)) {
        Some(true)
    } else if FALSE.iter().any(|candidate| candidate.eq_ignore_ascii_case(word)) {
        Some(false)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Argument<'a> {
    Duration(Duration),
    Reading(u16),
    Characteristic(CharacteristicId),
    Value(WriteValue),
    Assignment { name: &'a str, value: u32 },
    Keyword(&'static str),
}

struct CommandState<'a> {
    tag: CommandTag,
    arguments: HeaplessVec<Argument<'a>, MAX_ARGUMENTS>,
    topic: Option<&'a str>,
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        Self {
            tag,
            arguments: HeaplessVec::new(),
            topic: None,
        }
    }

    fn push(&mut self, argument: Argument<'a>) -> Result<(), ErrMode<GrammarError<'a>>> {
        self.arguments
            .push(argument)
            .map_err(|_| ErrMode::Cut(GrammarError::unexpected("end of command", None)))
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        let command = match (self.tag, self.arguments.as_slice()) {
            (CommandTag::Press, [Argument::Duration(hold)]) => Command::Press(PressCommand {
                hold: *hold,
                bounce: None,
            }),
            (CommandTag::Press, [Argument::Duration(hold), Argument::Assignment { value, .. }]) => {
                Command::Press(PressCommand {
                    hold: *hold,
                    bounce: Some(*value),
                })
            }
            (CommandTag::Sensor, [Argument::Reading(reading)]) => Command::Sensor(*reading),
            (CommandTag::Write, [Argument::Characteristic(characteristic), Argument::Value(value)]) => {
                Command::Write(WriteCommand {
                    characteristic: *characteristic,
                    value: *value,
                })
            }
            (CommandTag::Identify, []) => Command::Identify,
            (CommandTag::Reset, []) => Command::Reset,
            (CommandTag::Advance, [Argument::Duration(duration)]) => Command::Advance(*duration),
            (CommandTag::Config, [Argument::Assignment { name, value }]) => {
                Command::Config(ConfigCommand {
                    option: *name,
                    value: *value,
                })
            }
            (CommandTag::Hook, [Argument::Keyword(target), Argument::Keyword(behavior)]) => {
                Command::Hook(HookCommand {
                    target: hook_target(target),
                    behavior: hook_behavior(behavior),
                })
            }
            (CommandTag::Status, []) => Command::Status,
            (CommandTag::Help, []) => Command::Help(HelpCommand { topic: self.topic }),
            _ => {
                return Err(ErrMode::Backtrack(GrammarError::unexpected(
                    "command arguments",
                    None,
                )));
            }
        };
        Ok(command)
    }
}

fn hook_target(keyword: &str) -> ConfigTarget {
    if keyword.eq_ignore_ascii_case(HOOK_TARGETS[1]) {
        ConfigTarget::Accessory
    } else {
        ConfigTarget::Network
    }
}

fn hook_behavior(keyword: &str) -> HookBehavior {
    match HOOK_BEHAVIORS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(keyword))
    {
        Some(1) => HookBehavior::Fail,
        Some(2) => HookBehavior::Busy,
        Some(3) => HookBehavior::Pending,
        _ => HookBehavior::Confirm,
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_integer<'a, T: core::str::FromStr>(token: &Token<'a>) -> Result<T, GrammarError<'a>> {
    token
        .lexeme
        .parse::<T>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

//! Literal cells.
//!
//! Some CSV cells carry a serialized sequence in Python literal syntax:
//!
//! ```text
//! ['_:m1', '_:m2']        list of strings (relationship columns, reactions)
//! (10.5, -20)             tuple of numbers (geo point)
//! []                      empty list
//! ```
//!
//! The grammar accepted here is the subset of Python literals those exports
//! contain: quoted strings (single or double), integers, floats,
//! `True`/`False`/`None`, and nested lists/tuples with optional trailing
//! commas.
//!
//! String escapes follow Python: `\\ \' \" \n \t \r \a \b \f \v`, octal
//! `\ooo`, `\xhh`, `\uhhhh`, `\Uhhhhhhhh`, and a backslash before a newline
//! joins lines. Unknown escapes such as `\d` are kept as written. Named
//! escapes (`\N{...}`) are not supported and fail the cell.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while_m_n},
    character::complete::{anychar, char as pchar, multispace0},
    combinator::{all_consuming, map, map_opt, opt, value, verify},
    multi::{fold_many0, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl Literal {
    fn kind(&self) -> &'static str {
        match self {
            Literal::Str(_) => "string",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
            Literal::None => "None",
            Literal::List(_) => "list",
            Literal::Tuple(_) => "tuple",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    fn items(self) -> Option<Vec<Literal>> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}: `{input}`")]
pub struct LiteralError {
    pub input: String,
    pub message: String,
}

impl LiteralError {
    pub(crate) fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

/// Parse one complete literal.
pub fn parse_literal(text: &str) -> Result<Literal, LiteralError> {
    all_consuming(delimited(multispace0, literal, multispace0))(text)
        .map(|(_, v)| v)
        .map_err(|_| LiteralError::new(text, "invalid literal"))
}

/// Parse a list or tuple of strings. A blank cell is an empty list.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, LiteralError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed = parse_literal(text)?;
    let kind = parsed.kind();
    let items = parsed
        .items()
        .ok_or_else(|| LiteralError::new(text, format!("expected a list, found {kind}")))?;

    items
        .into_iter()
        .map(|item| match item {
            Literal::Str(s) => Ok(s),
            other => Err(LiteralError::new(
                text,
                format!("expected list items to be strings, found {}", other.kind()),
            )),
        })
        .collect()
}

/// Parse a 2-element numeric tuple or list, e.g. `(10, 20.5)`.
pub fn parse_pair(text: &str) -> Result<[f64; 2], LiteralError> {
    let parsed = parse_literal(text)?;
    let kind = parsed.kind();
    let items = parsed
        .items()
        .ok_or_else(|| LiteralError::new(text, format!("expected a pair, found {kind}")))?;

    match items.as_slice() {
        [a, b] => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Ok([a, b]),
            (Some(_), Some(_)) => Err(LiteralError::new(text, "pair items must be finite")),
            _ => Err(LiteralError::new(text, "pair items must be numbers")),
        },
        other => Err(LiteralError::new(
            text,
            format!("expected 2 items, found {}", other.len()),
        )),
    }
}

// ============================================================================
// Grammar
// ============================================================================

fn literal(input: &str) -> IResult<&str, Literal> {
    preceded(
        multispace0,
        alt((
            map(quoted_string, Literal::Str),
            list,
            tuple_or_group,
            keyword,
            number,
        )),
    )(input)
}

#[derive(Clone)]
enum Fragment<'a> {
    Text(&'a str),
    Char(char),
    /// Unknown escape, kept with its backslash.
    Raw(char),
    LineJoin,
}

fn code_point(digits: usize, radix: u32) -> impl FnMut(&str) -> IResult<&str, char> {
    move |input| {
        map_opt(
            take_while_m_n(digits, digits, move |c: char| c.is_digit(radix)),
            |code: &str| u32::from_str_radix(code, radix).ok().and_then(char::from_u32),
        )(input)
    }
}

fn escape(input: &str) -> IResult<&str, Fragment<'_>> {
    preceded(
        pchar('\\'),
        alt((
            map(
                alt((
                    value('\\', pchar('\\')),
                    value('\'', pchar('\'')),
                    value('"', pchar('"')),
                    value('\n', pchar('n')),
                    value('\t', pchar('t')),
                    value('\r', pchar('r')),
                    value('\u{07}', pchar('a')),
                    value('\u{08}', pchar('b')),
                    value('\u{0c}', pchar('f')),
                    value('\u{0b}', pchar('v')),
                    preceded(pchar('x'), code_point(2, 16)),
                    preceded(pchar('u'), code_point(4, 16)),
                    preceded(pchar('U'), code_point(8, 16)),
                    map_opt(
                        take_while_m_n(1, 3, |c: char| c.is_digit(8)),
                        |code: &str| u32::from_str_radix(code, 8).ok().and_then(char::from_u32),
                    ),
                )),
                Fragment::Char,
            ),
            value(Fragment::LineJoin, pchar('\n')),
            // `x`, `u`, `U` and `N` only reach here when malformed.
            map(
                verify(anychar, |c: &char| !matches!(*c, 'x' | 'u' | 'U' | 'N')),
                Fragment::Raw,
            ),
        )),
    )(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    fn body(quote: char, stop: &'static str) -> impl FnMut(&str) -> IResult<&str, String> {
        move |input| {
            delimited(
                pchar(quote),
                fold_many0(
                    alt((map(is_not(stop), Fragment::Text), escape)),
                    String::new,
                    |mut out, fragment| {
                        match fragment {
                            Fragment::Text(text) => out.push_str(text),
                            Fragment::Char(c) => out.push(c),
                            Fragment::Raw(c) => {
                                out.push('\\');
                                out.push(c);
                            }
                            Fragment::LineJoin => {}
                        }
                        out
                    },
                ),
                pchar(quote),
            )(input)
        }
    }

    alt((body('\'', "\\'"), body('"', "\\\"")))(input)
}

fn keyword(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Bool(true), tag("True")),
        value(Literal::Bool(false), tag("False")),
        value(Literal::None, tag("None")),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize_float(input)?;
    let is_integral = !text.contains(['.', 'e', 'E']);
    let parsed = if is_integral {
        text.parse::<i64>()
            .map(Literal::Int)
            .or_else(|_| text.parse::<f64>().map(Literal::Float))
    } else {
        text.parse::<f64>().map(Literal::Float)
    };
    match parsed {
        Ok(lit) => Ok((rest, lit)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Comma-separated items followed by an optional trailing comma.
fn items(input: &str) -> IResult<&str, (Vec<Literal>, bool)> {
    verify(
        tuple((
            separated_list0(delimited(multispace0, pchar(','), multispace0), literal),
            map(opt(preceded(multispace0, pchar(','))), |c| c.is_some()),
        )),
        |(items, trailing_comma): &(Vec<Literal>, bool)| !(*trailing_comma && items.is_empty()),
    )(input)
}

fn list(input: &str) -> IResult<&str, Literal> {
    map(
        delimited(
            pchar('['),
            terminated(items, multispace0),
            pchar(']'),
        ),
        |(items, _)| Literal::List(items),
    )(input)
}

/// `(a, b)` is a tuple, `(a,)` a 1-tuple, `(a)` just `a`.
fn tuple_or_group(input: &str) -> IResult<&str, Literal> {
    map(
        delimited(
            pchar('('),
            terminated(items, multispace0),
            pchar(')'),
        ),
        |(mut items, trailing_comma)| {
            if items.len() == 1 && !trailing_comma {
                items.remove(0)
            } else {
                Literal::Tuple(items)
            }
        },
    )(input)
}

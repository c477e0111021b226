use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::char,
    combinator::recognize,
    multi::many0_count,
    sequence::pair,
};

use crate::ast::{Node, Value, form};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Tag of the implicit block wrapping a whole program
const PROGRAM_TAG: &str = "do";

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Deepest form nesting accepted before failing with `TooDeeplyNested`
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// `;` up to (not including) the end of the line
fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_till(|c: char| c == '\n'))).parse(input)
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while1(char::is_whitespace).parse(input)
}

/// Skip any mix of whitespace and line comments
fn skip_trivia(input: &str) -> &str {
    match many0_count(alt((whitespace, line_comment))).parse(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

/// Maximal run of characters that are neither whitespace nor parentheses
fn atom(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| c.is_whitespace() || c == '(' || c == ')').parse(input)
}

/// Whether the atom is written as a whole number, with no fraction or exponent
fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Literal when the atom decodes as a JSON scalar, symbol otherwise.
/// The non-finite float spellings `NaN`, `Infinity` and `-Infinity` are accepted too.
fn classify_atom(text: &str) -> Result<Node, ParseErrorKind> {
    let special = match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    };
    if let Some(x) = special {
        return Ok(Node::Literal(Value::Float(x)));
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        // Whole numbers never silently lose precision as floats
        Ok(serde_json::Value::Number(n)) if n.as_i64().is_none() && is_integer_text(text) => {
            Err(ParseErrorKind::IntegerOutOfRange)
        }
        Ok(json) => Ok(Value::from_json(json)
            .map_or_else(|| Node::Symbol(text.to_owned()), Node::Literal)),
        Err(_) => Ok(Node::Symbol(text.to_owned())),
    }
}

/// Recursive-descent reader over one source text
struct Reader<'s> {
    source: &'s str,
    max_depth: usize,
}

impl<'s> Reader<'s> {
    fn offset(&self, rest: &'s str) -> usize {
        self.source.len() - rest.len()
    }

    fn error(&self, kind: ParseErrorKind, at: &'s str, found: Option<String>) -> ParseError {
        ParseError::with_context_and_found(kind, self.source, self.offset(at), found)
    }

    fn parse_expr(&self, input: &'s str, depth: usize) -> Result<(&'s str, Node), ParseError> {
        if depth >= self.max_depth {
            return Err(ParseError::new(
                ParseErrorKind::TooDeeplyNested,
                format!("expression too deeply nested (max depth: {})", self.max_depth),
                None,
                None,
            ));
        }

        let input = skip_trivia(input);
        match input.chars().next() {
            Some('(') => self.parse_form(input, depth),
            Some(')') => Err(self.error(ParseErrorKind::BadParenthesis, input, Some(")".into()))),
            _ => {
                let (rest, text) = atom(input)
                    .map_err(|_| self.error(ParseErrorKind::EmptyProgram, input, None))?;
                if text.is_empty() {
                    return Err(self.error(ParseErrorKind::EmptyProgram, input, None));
                }
                let node = classify_atom(text)
                    .map_err(|kind| self.error(kind, input, Some(text.to_owned())))?;
                Ok((rest, node))
            }
        }
    }

    /// Parse `( expr* )`, `open` starting at the opening parenthesis
    fn parse_form(&self, open: &'s str, depth: usize) -> Result<(&'s str, Node), ParseError> {
        let mut rest = &open[1..];
        let mut elements = Vec::new();

        loop {
            rest = skip_trivia(rest);
            match rest.chars().next() {
                None => {
                    return Err(self.error(
                        ParseErrorKind::UnbalancedParenthesis,
                        open,
                        Some("(".into()),
                    ));
                }
                Some(')') => return Ok((&rest[1..], form(elements))),
                Some(_) => {
                    let (after, node) = self.parse_expr(rest, depth + 1)?;
                    elements.push(node);
                    rest = after;
                }
            }
        }
    }

    /// Top-level forms up to the end of input. A `)` here would close the
    /// implicit program block early, leaving the rest as trailing garbage.
    fn parse_forms(&self) -> Result<Vec<Node>, ParseError> {
        let mut rest = self.source;
        let mut forms = Vec::new();

        loop {
            rest = skip_trivia(rest);
            match rest.chars().next() {
                None => return Ok(forms),
                Some(')') => {
                    return Err(self.error(
                        ParseErrorKind::TrailingGarbage,
                        rest,
                        Some(")".into()),
                    ));
                }
                Some(_) => {
                    // Depth 1: the forms sit inside the implicit block
                    let (after, node) = self.parse_expr(rest, 1)?;
                    forms.push(node);
                    rest = after;
                }
            }
        }
    }
}

/// Parse a single expression. Anything but trivia after it is trailing garbage.
pub fn parse_expr(input: &str) -> Result<Node, Error> {
    let reader = Reader {
        source: input,
        max_depth: MAX_PARSE_DEPTH,
    };
    let (rest, node) = reader.parse_expr(input, 0)?;
    let rest = skip_trivia(rest);
    if !rest.is_empty() {
        let found: String = rest.chars().take(10).collect();
        return Err(reader.error(ParseErrorKind::TrailingGarbage, rest, Some(found)).into());
    }
    Ok(node)
}

/// Parse the top-level forms of a program without the implicit block around them.
pub fn parse_forms(input: &str) -> Result<Vec<Node>, Error> {
    parse_forms_with_config(input, ParseConfig::default())
}

/// Parse the top-level forms of a program with explicit limits.
pub fn parse_forms_with_config(input: &str, config: ParseConfig) -> Result<Vec<Node>, Error> {
    let reader = Reader {
        source: input,
        max_depth: config.max_depth,
    };
    let forms = reader.parse_forms()?;
    tracing::debug!(forms = forms.len(), bytes = input.len(), "parsed program");
    Ok(forms)
}

/// Parse a complete program: its top-level forms wrapped as `(do form...)`.
pub fn parse_program(input: &str) -> Result<Node, Error> {
    parse_program_with_config(input, ParseConfig::default())
}

/// Parse a complete program with explicit limits.
pub fn parse_program_with_config(input: &str, config: ParseConfig) -> Result<Node, Error> {
    let forms = parse_forms_with_config(input, config)?;
    let mut elements = Vec::with_capacity(forms.len() + 1);
    elements.push(Node::Symbol(PROGRAM_TAG.into()));
    elements.extend(forms);
    Ok(form(elements))
}

//! Structured-literal encoding of locations.
//!
//! The enriched log stores a [`LocationInfo`] as a five-slot tuple literal and
//! a list of them as a list literal:
//!
//! ```text
//! (50.0, 10.0, 'DE', 50, 'EU')
//! [(40.0, -75.0, 'US', 100, 'NA'), (None, None, None, None, None)]
//! ```
//!
//! This is the notation the analysis side evaluates with a generic literal
//! reader, so the writer sticks to its subset: `None`, decimal numbers,
//! quoted strings with backslash escapes, tuples and lists. The parser here
//! accepts the same subset and nothing more.

use crate::error::{ErrorKind, Result};
use ecs_geo::LocationInfo;
use std::fmt::{Display, Formatter, Result as FmtResult, Write};

const NULL: &str = "None";

/// Display adapter writing one location as a tuple literal.
pub struct LocationLiteral<'a>(pub &'a LocationInfo);

/// Display adapter writing a sequence of locations as a list literal.
pub struct LocationsLiteral<'a>(pub &'a [LocationInfo]);

impl Display for LocationLiteral<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let location = self.0;
        f.write_char('(')?;
        write_float(f, location.latitude)?;
        f.write_str(", ")?;
        write_float(f, location.longitude)?;
        f.write_str(", ")?;
        write_str(f, location.country_code.as_deref())?;
        f.write_str(", ")?;
        match location.accuracy_radius_km {
            Some(radius) => write!(f, "{radius}")?,
            None => f.write_str(NULL)?,
        }
        f.write_str(", ")?;
        write_str(f, location.continent_code.as_deref())?;
        f.write_char(')')
    }
}

impl Display for LocationsLiteral<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_char('[')?;
        for (i, location) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            LocationLiteral(location).fmt(f)?;
        }
        f.write_char(']')
    }
}

fn write_float(f: &mut Formatter<'_>, value: Option<f64>) -> FmtResult {
    match value {
        // `{:?}` always keeps a decimal point or exponent, so the value reads
        // back as a float rather than an integer.
        Some(value) if value.is_finite() => write!(f, "{value:?}"),
        _ => f.write_str(NULL),
    }
}

fn write_str(f: &mut Formatter<'_>, value: Option<&str>) -> FmtResult {
    let Some(value) = value else {
        return f.write_str(NULL);
    };
    let quote = if value.contains('\'') && !value.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            },
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Parse a tuple literal back into a location.
pub fn parse_location(text: &str) -> Result<LocationInfo> {
    let mut parser = Parser::new(text);
    let value = parser.value()?;
    parser.finish()?;
    location_from(value, text)
}

/// Parse a list literal back into locations.
pub fn parse_locations(text: &str) -> Result<Vec<LocationInfo>> {
    let mut parser = Parser::new(text);
    let Value::Sequence(items) = parser.value()? else {
        exn::bail!(ErrorKind::Literal(text.to_string()));
    };
    parser.finish()?;
    items.into_iter().map(|item| location_from(item, text)).collect()
}

fn location_from(value: Value, text: &str) -> Result<LocationInfo> {
    let invalid = || ErrorKind::Literal(text.to_string());
    let Value::Sequence(slots) = value else {
        exn::bail!(invalid());
    };
    let Ok([latitude, longitude, country_code, accuracy, continent_code]) = <[Value; 5]>::try_from(slots) else {
        exn::bail!(invalid());
    };
    Ok(LocationInfo {
        latitude: latitude.into_float().ok_or_else(invalid)?,
        longitude: longitude.into_float().ok_or_else(invalid)?,
        country_code: country_code.into_string().ok_or_else(invalid)?,
        accuracy_radius_km: accuracy.into_radius().ok_or_else(invalid)?,
        continent_code: continent_code.into_string().ok_or_else(invalid)?,
    })
}

/// A parsed literal. Tuples and lists are not distinguished.
#[derive(Debug, PartialEq)]
enum Value {
    Null,
    Number(f64),
    Str(String),
    Sequence(Vec<Value>),
}

impl Value {
    // Outer option: is the slot the right type? Inner option: is it null?
    fn into_float(self) -> Option<Option<f64>> {
        match self {
            Value::Null => Some(None),
            Value::Number(n) => Some(Some(n)),
            _ => None,
        }
    }

    fn into_string(self) -> Option<Option<String>> {
        match self {
            Value::Null => Some(None),
            Value::Str(s) => Some(Some(s)),
            _ => None,
        }
    }

    fn into_radius(self) -> Option<Option<u16>> {
        match self {
            Value::Null => Some(None),
            Value::Number(n) if n.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&n) => Some(Some(n as u16)),
            _ => None,
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, rest: text }
    }

    fn error(&self) -> ErrorKind {
        ErrorKind::Literal(self.text.to_string())
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            },
            None => false,
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.skip_whitespace();
        if !self.rest.is_empty() {
            exn::bail!(self.error());
        }
        Ok(())
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.rest.chars().next() {
            Some('(') => self.sequence('(', ')'),
            Some('[') => self.sequence('[', ']'),
            Some(quote @ ('\'' | '"')) => self.string(quote),
            Some(_) if self.rest.starts_with(NULL) => {
                self.rest = &self.rest[NULL.len()..];
                Ok(Value::Null)
            },
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            _ => exn::bail!(self.error()),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value> {
        self.eat(open);
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(Value::Sequence(items));
            }
            items.push(self.value()?);
            if !self.eat(',') {
                if self.eat(close) {
                    return Ok(Value::Sequence(items));
                }
                exn::bail!(self.error());
            }
        }
    }

    fn number(&mut self) -> Result<Value> {
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let number = digits.parse::<f64>().map_err(|_| self.error())?;
        self.rest = rest;
        Ok(Value::Number(number))
    }

    fn string(&mut self, quote: char) -> Result<Value> {
        let mut chars = self.rest.char_indices().skip(1);
        let mut value = String::new();
        while let Some((i, c)) = chars.next() {
            match c {
                c if c == quote => {
                    self.rest = &self.rest[i + c.len_utf8()..];
                    return Ok(Value::Str(value));
                },
                '\\' => {
                    let escaped = match chars.next() {
                        Some((_, 'n')) => '\n',
                        Some((_, 'r')) => '\r',
                        Some((_, 't')) => '\t',
                        Some((_, 'x')) => self.hex_escape(&mut chars, 2)?,
                        Some((_, 'u')) => self.hex_escape(&mut chars, 4)?,
                        Some((_, c @ ('\\' | '\'' | '"'))) => c,
                        _ => exn::bail!(self.error()),
                    };
                    value.push(escaped);
                },
                c => value.push(c),
            }
        }
        exn::bail!(self.error())
    }

    fn hex_escape(&self, chars: &mut impl Iterator<Item = (usize, char)>, len: usize) -> Result<char> {
        let digits: String = chars.take(len).map(|(_, c)| c).collect();
        if digits.len() != len {
            exn::bail!(self.error());
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error().into())
    }
}

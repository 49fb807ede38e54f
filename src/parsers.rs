//! The `Parse` trait for attribute values, and utilities for parsers.

use cssparser::{BasicParseError, BasicParseErrorKind, Parser, ParserInput};

/// A short-lived parse error tied to the lifetime of the input string.
pub type ParseError<'i> = cssparser::ParseError<'i, ValueError>;

/// A simple error which refers to an attribute's value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The value could not be parsed
    Parse(String),

    /// The value could be parsed, but is invalid
    Value(String),
}

impl ValueError {
    pub fn parse_error(s: &str) -> ValueError {
        ValueError::Parse(s.to_string())
    }

    pub fn value_error(s: &str) -> ValueError {
        ValueError::Value(s.to_string())
    }
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ValueError::Parse(ref s) => write!(f, "parse error: {s}"),
            ValueError::Value(ref s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl<'a> From<BasicParseError<'a>> for ValueError {
    fn from(e: BasicParseError<'_>) -> ValueError {
        let BasicParseError { kind, .. } = e;

        let msg = match kind {
            BasicParseErrorKind::UnexpectedToken(_) => "unexpected token",
            BasicParseErrorKind::EndOfInput => "unexpected end of input",
            _ => "unexpected input",
        };

        ValueError::parse_error(msg)
    }
}

/// Trait to parse values using `cssparser::Parser`.
pub trait Parse: Sized {
    /// Parses a value out of the `parser`.
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>>;

    /// Convenience function to parse a value out of a `&str`.
    fn parse_str(s: &str) -> Result<Self, ParseError<'_>> {
        let mut input = ParserInput::new(s);
        let mut parser = Parser::new(&mut input);

        let res = Self::parse(&mut parser)?;
        parser.expect_exhausted()?;

        Ok(res)
    }
}

/// Consumes a comma if it exists, or does nothing.
pub fn optional_comma(parser: &mut Parser<'_, '_>) {
    let _ = parser.try_parse(|p| p.expect_comma());
}

impl Parse for f64 {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let loc = parser.current_source_location();
        let n = parser.expect_number()?;
        if n.is_finite() {
            Ok(f64::from(n))
        } else {
            Err(loc.new_custom_error(ValueError::value_error("expected finite number")))
        }
    }
}

#[derive(Eq, PartialEq)]
pub enum NumberListLength {
    Exact(usize),
    Unbounded,
}

/// Whitespace- or comma-separated list of numbers, as in `viewBox`.
#[derive(Debug, PartialEq)]
pub struct NumberList(pub Vec<f64>);

impl NumberList {
    pub fn parse<'i>(
        parser: &mut Parser<'i, '_>,
        length: NumberListLength,
    ) -> Result<Self, ParseError<'i>> {
        let mut v = match length {
            NumberListLength::Exact(l) if l > 0 => Vec::<f64>::with_capacity(l),
            NumberListLength::Exact(_) => unreachable!("NumberListLength::Exact cannot be 0"),
            NumberListLength::Unbounded => Vec::<f64>::new(),
        };

        if parser.is_exhausted() && length == NumberListLength::Unbounded {
            return Ok(NumberList(v));
        }

        for i in 0.. {
            if i != 0 {
                optional_comma(parser);
            }

            v.push(f64::parse(parser)?);

            if let NumberListLength::Exact(l) = length {
                if i + 1 == l {
                    break;
                }
            }

            if parser.is_exhausted() && length == NumberListLength::Unbounded {
                break;
            }
        }

        Ok(NumberList(v))
    }

    pub fn parse_str(s: &str, length: NumberListLength) -> Result<NumberList, ParseError<'_>> {
        let mut input = ParserInput::new(s);
        let mut parser = Parser::new(&mut input);

        let res = Self::parse(&mut parser, length)?;
        parser.expect_exhausted()?;
        Ok(res)
    }
}

/// Formats a coordinate for writing back into an SVG attribute.
///
/// At most 9 fractional digits, trailing zeros stripped, never scientific
/// notation.  A value that rounds to an integer serializes without a decimal
/// point.
pub fn format_coord(value: f64) -> String {
    let mut s = format!("{value:.9}");

    let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
    s.truncate(trimmed);

    if s == "-0" {
        return String::from("0");
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_number_list() {
        assert_eq!(
            NumberList::parse_str("5", NumberListLength::Exact(1)),
            Ok(NumberList(vec![5.0]))
        );

        assert_eq!(
            NumberList::parse_str("1 2 3 4", NumberListLength::Exact(4)),
            Ok(NumberList(vec![1.0, 2.0, 3.0, 4.0]))
        );

        assert_eq!(
            NumberList::parse_str("1, 2, 3.0, 4, 5", NumberListLength::Unbounded),
            Ok(NumberList(vec![1.0, 2.0, 3.0, 4.0, 5.0]))
        );
    }

    #[test]
    fn errors_on_invalid_number_list() {
        // empty
        assert!(NumberList::parse_str("", NumberListLength::Exact(1)).is_err());

        // garbage
        assert!(NumberList::parse_str("foo", NumberListLength::Exact(1)).is_err());
        assert!(NumberList::parse_str("1foo", NumberListLength::Exact(2)).is_err());
        assert!(NumberList::parse_str("1 foo", NumberListLength::Exact(2)).is_err());
        assert!(NumberList::parse_str("1,foo", NumberListLength::Exact(2)).is_err());

        // too many
        assert!(NumberList::parse_str("1 2", NumberListLength::Exact(1)).is_err());

        // too few
        assert!(NumberList::parse_str("1", NumberListLength::Exact(2)).is_err());

        // trailing comma
        assert!(NumberList::parse_str("1,", NumberListLength::Unbounded).is_err());
    }

    #[test]
    fn formats_coords() {
        assert_eq!(format_coord(0.0), "0");
        assert_eq!(format_coord(-0.0), "0");
        assert_eq!(format_coord(3.0), "3");
        assert_eq!(format_coord(0.4), "0.4");
        assert_eq!(format_coord(-12.25), "-12.25");
        assert_eq!(format_coord(1.0 / 3.0), "0.333333333");
        assert_eq!(format_coord(1e-10), "0");
        assert_eq!(format_coord(1234567.5), "1234567.5");
    }
}

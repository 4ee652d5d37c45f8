//! Template pattern scanner.
//!
//! Patterns follow the Python `str.format` brace syntax restricted to plain
//! field names: `{cn}`, `{member.cn}`, with `{{` and `}}` as escaped braces.

use super::{Field, Segment, Span, TemplateError};

/// Scans a template pattern into literal and field segments.
pub(crate) struct TemplateParser<'a> {
    /// The pattern being scanned.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// Pending literal text.
    literal: String,
    /// Segments produced so far.
    segments: Vec<Segment>,
}

impl<'a> TemplateParser<'a> {
    /// Creates a parser for the given pattern.
    pub(crate) const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            literal: String::new(),
            segments: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>, start: usize) -> TemplateError {
        TemplateError::new(message, Span::new(start, self.pos), self.input)
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.segments.push(Segment::Literal(text));
        }
    }

    /// Consumes the parser and returns the pattern segments.
    pub(crate) fn parse(mut self) -> Result<Vec<Segment>, TemplateError> {
        while let Some(c) = self.advance() {
            match c {
                '{' if self.peek() == Some('{') => {
                    self.advance();
                    self.literal.push('{');
                }
                '{' => {
                    let start = self.pos - 1;
                    let field = self.scan_field(start)?;
                    self.flush_literal();
                    self.segments.push(Segment::Field(field));
                }
                '}' if self.peek() == Some('}') => {
                    self.advance();
                    self.literal.push('}');
                }
                '}' => {
                    return Err(self.error("Single '}' encountered", self.pos - 1));
                }
                other => self.literal.push(other),
            }
        }
        self.flush_literal();
        Ok(self.segments)
    }

    /// Scans a field name up to the closing brace. The opening brace is
    /// already consumed.
    fn scan_field(&mut self, start: usize) -> Result<Field, TemplateError> {
        let name_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated field", start)),
                Some('}') => break,
                Some(c) if is_attribute_char(c) => {
                    self.advance();
                }
                Some(c) => {
                    self.advance();
                    return Err(self.error(format!("Invalid character '{c}' in field name"), start));
                }
            }
        }
        let name = &self.input[name_start..self.pos];
        self.advance(); // }

        if name.is_empty() {
            return Err(self.error("Empty field name", start));
        }
        if name.split('.').any(str::is_empty) {
            return Err(self.error(format!("Malformed field name '{name}'"), start));
        }
        Ok(Field::entry(name, Span::new(start, self.pos)))
    }
}

/// Characters allowed in an LDAP attribute description, plus `.` for
/// sub-attribute access.
fn is_attribute_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str) -> Vec<Segment> {
        TemplateParser::new(pattern)
            .parse()
            .unwrap_or_else(|e| panic!("Failed to parse {pattern}: {e}"))
    }

    fn parse_err(pattern: &str) -> TemplateError {
        TemplateParser::new(pattern)
            .parse()
            .expect_err(&format!("Expected template error for: {pattern}"))
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(
            parse("readers"),
            vec![Segment::Literal("readers".to_string())]
        );
    }

    #[test]
    fn test_fields_and_literals() {
        let segments = parse("ext_{cn}_{member.sAMAccountName}");
        assert_eq!(segments.len(), 4);
        assert!(matches!(&segments[0], Segment::Literal(s) if s == "ext_"));
        assert!(matches!(&segments[1], Segment::Field(f) if f.name() == "cn"));
        assert!(matches!(&segments[3], Segment::Field(f) if f.name() == "member.sAMAccountName"));
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(
            parse("{{literal}}"),
            vec![Segment::Literal("{literal}".to_string())]
        );
    }

    #[test]
    fn test_field_span() {
        let segments = parse("ab{cn}");
        match &segments[1] {
            Segment::Field(f) => assert_eq!(f.span(), Span::new(2, 6)),
            other => panic!("Expected field, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_field() {
        let err = parse_err("{cn");
        assert!(err.message.contains("Unterminated"));
        assert_eq!(err.span.start, 0);
    }

    #[test]
    fn test_single_closing_brace() {
        let err = parse_err("cn}");
        assert!(err.message.contains("Single '}'"));
    }

    #[test]
    fn test_empty_field() {
        assert!(parse_err("x{}").message.contains("Empty field name"));
    }

    #[test]
    fn test_invalid_character() {
        assert!(parse_err("{c n}").message.contains("Invalid character ' '"));
        assert!(parse_err("{cn!r}").message.contains("Invalid character '!'"));
    }

    #[test]
    fn test_malformed_dots() {
        assert!(parse_err("{member.}").message.contains("Malformed"));
        assert!(parse_err("{.cn}").message.contains("Malformed"));
    }
}

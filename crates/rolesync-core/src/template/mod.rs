//! Attribute templates.
//!
//! An [`AttributeTemplate`] is a pattern such as `"{cn}_readers"` whose
//! fields name directory attributes. A template without fields is constant
//! and renders to its literal text.

mod error;
mod parser;
mod span;

use std::fmt;

use serde::{Deserialize, Deserializer};

pub use error::TemplateError;
pub use span::Span;

use parser::TemplateParser;

/// Where a field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// An attribute of the entry returned by the main search.
    Entry,
    /// An attribute of the joined sub-search entry.
    Subentry,
}

/// A field reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    source: FieldSource,
    span: Span,
}

impl Field {
    pub(crate) fn entry(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Entry,
            span,
        }
    }

    /// Returns a copy of this field resolved against the sub-search entry.
    #[must_use]
    pub fn into_subentry(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Subentry,
            span: self.span,
        }
    }

    /// Full field name, e.g. `member.cn`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn source(&self) -> FieldSource {
        self.source
    }

    #[must_use]
    pub const fn span(&self) -> Span {
        self.span
    }

    /// Attribute part of the field name, before the first dot.
    #[must_use]
    pub fn attribute(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(head, _)| head)
    }

    /// Sub-attribute part of the field name, after the first dot.
    #[must_use]
    pub fn sub_attribute(&self) -> Option<&str> {
        self.name.split_once('.').map(|(_, tail)| tail)
    }

    #[must_use]
    pub fn is_subentry(&self) -> bool {
        self.source == FieldSource::Subentry
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            FieldSource::Entry => f.write_str(&self.name),
            FieldSource::Subentry => write!(f, "subentry.{}", self.name),
        }
    }
}

/// A parsed template piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, braces already unescaped.
    Literal(String),
    /// A field to substitute.
    Field(Field),
}

/// A string pattern with placeholders bound to directory attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl AttributeTemplate {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] on malformed placeholder syntax: an
    /// unterminated `{`, a lone `}`, an empty or invalid field name.
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let segments = TemplateParser::new(pattern).parse()?;
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// Builds a constant template rendering to `text`.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.to_string())]
        };
        Self {
            pattern: text.replace('{', "{{").replace('}', "}}"),
            segments,
        }
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Iterates referenced fields in pattern order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(field),
            Segment::Literal(_) => None,
        })
    }

    /// Returns true if the template references no field.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Returns the rendered text of a constant template.
    #[must_use]
    pub fn as_literal(&self) -> Option<String> {
        if self.is_constant() {
            self.format(|_| None).ok()
        } else {
            None
        }
    }

    /// Builds a new template with every field passed through `f`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn try_map_fields<E, F>(&self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(&Field) -> Result<Field, E>,
    {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Field(field) => f(field).map(Segment::Field),
                Segment::Literal(text) => Ok(Segment::Literal(text.clone())),
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            pattern: self.pattern.clone(),
            segments,
        })
    }

    /// Renders the template, asking `lookup` for the value of each field.
    ///
    /// A constant template never calls `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if `lookup` has no value for a field.
    pub fn format<F>(&self, mut lookup: F) -> Result<String, TemplateError>
    where
        F: FnMut(&Field) -> Option<String>,
    {
        let mut out = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = lookup(field).ok_or_else(|| {
                        TemplateError::missing_value(field.name(), field.span(), &self.pattern)
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for AttributeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl std::str::FromStr for AttributeTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for AttributeTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Self::parse(&pattern).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_constant_template_renders_pattern() {
        let template = AttributeTemplate::parse("readers").unwrap();
        assert!(template.is_constant());
        let rendered = template
            .format(|_| panic!("constant template must not look up fields"))
            .unwrap();
        assert_eq!(rendered, "readers");
    }

    #[test]
    fn test_literal_escapes_braces() {
        let template = AttributeTemplate::literal("a{b}");
        assert_eq!(template.pattern(), "a{{b}}");
        assert_eq!(template.as_literal().as_deref(), Some("a{b}"));
        assert_eq!(AttributeTemplate::parse(template.pattern()).unwrap(), template);
    }

    #[test]
    fn test_fields_in_order() {
        let template = AttributeTemplate::parse("{cn}_{member.uid}_{cn}").unwrap();
        let names: Vec<&str> = template.fields().map(Field::name).collect();
        assert_eq!(names, vec!["cn", "member.uid", "cn"]);
        assert!(!template.is_constant());
    }

    #[test]
    fn test_format_with_values() {
        let template = AttributeTemplate::parse("{cn}_{{ro}}").unwrap();
        let values = HashMap::from([("cn", "alice")]);
        let rendered = template
            .format(|f| values.get(f.name()).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(rendered, "alice_{ro}");
    }

    #[test]
    fn test_format_missing_value() {
        let template = AttributeTemplate::parse("x_{uid}").unwrap();
        let err = template.format(|_| None).unwrap_err();
        assert!(err.message.contains("uid"));
        assert_eq!(err.span, Span::new(2, 7));
    }

    #[test]
    fn test_field_parts() {
        let template = AttributeTemplate::parse("{member.cn}").unwrap();
        let field = template.fields().next().unwrap();
        assert_eq!(field.attribute(), "member");
        assert_eq!(field.sub_attribute(), Some("cn"));
        assert_eq!(field.source(), FieldSource::Entry);
    }

    #[test]
    fn test_map_fields_keeps_pattern() {
        let template = AttributeTemplate::parse("{member.cn}").unwrap();
        let mapped = template
            .try_map_fields(|f| Ok::<_, ()>(f.clone().into_subentry("cn")))
            .unwrap();
        assert_eq!(mapped.pattern(), "{member.cn}");
        let field = mapped.fields().next().unwrap();
        assert!(field.is_subentry());
        assert_eq!(field.to_string(), "subentry.cn");
    }

    #[test]
    fn test_deserialize_rejects_bad_pattern() {
        let result: Result<AttributeTemplate, _> = serde_yaml::from_str("'{cn'");
        assert!(result.is_err());
    }
}

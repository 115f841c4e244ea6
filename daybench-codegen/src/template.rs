//! Slot Templates
//!
//! A template is literal text with `{{name}}` slots. It is split into segments
//! once, then rendered in a single pass, so slot values are never rescanned
//! (generated code is free to contain braces of its own).

use std::collections::BTreeMap;
use thiserror::Error;

/// Template rendering errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` without a closing `}}`
    #[error("Unterminated slot starting at byte {0}")]
    Unterminated(usize),

    /// A slot with no value
    #[error("No value for slot '{0}'")]
    MissingSlot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'t> {
    Literal(&'t str),
    Slot(&'t str),
}

/// Parsed template
#[derive(Debug, Clone)]
pub struct Template<'t> {
    segments: Vec<Segment<'t>>,
}

impl<'t> Template<'t> {
    /// Split `text` into literal and slot segments
    pub fn parse(text: &'t str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(&rest[..start]));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + start))?;
            segments.push(Segment::Slot(after[..end].trim()));

            let consumed = start + 2 + end + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Self { segments })
    }

    /// Names of all slots, in order of appearance
    pub fn slots(&self) -> impl Iterator<Item = &'t str> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(*name),
            Segment::Literal(_) => None,
        })
    }

    /// Render with the given slot values
    pub fn render(&self, values: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingSlot((*name).to_string()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

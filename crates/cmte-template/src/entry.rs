use cmte_core::error::Result;

use crate::expr::ValueExprs;
use crate::kind::FieldKind;

/// One declarative field-construction rule of a translation template.
/// Entries execute in declaration order; the flags steer the engine:
/// mandatory turns a missing source into a hard error, blocker stops the
/// remaining template once the entry fires, new-branch forces a fresh
/// sequence element on ordered encoders downstream.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub tag: String,
    pub path: String,
    pub kind: FieldKind,
    pub value: ValueExprs,
    pub filters: Vec<String>,
    pub mandatory: bool,
    pub blocker: bool,
    pub new_branch: bool,
}

impl TemplateEntry {
    /// Build an entry, compiling the raw value expression
    pub fn new(tag: &str, path: &str, kind: FieldKind, value: &str) -> Result<Self> {
        Ok(Self {
            tag: tag.to_string(),
            path: path.to_string(),
            kind,
            value: ValueExprs::compile(value)?,
            filters: Vec::new(),
            mandatory: false,
            blocker: false,
            new_branch: false,
        })
    }

    pub fn with_filters(mut self, filters: &[&str]) -> Self {
        self.filters = filters.iter().map(ToString::to_string).collect();
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn blocker(mut self) -> Self {
        self.blocker = true;
        self
    }

    pub fn new_branch(mut self) -> Self {
        self.new_branch = true;
        self
    }
}

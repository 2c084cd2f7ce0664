use crate::error::{CmteError, Result};

/// Separator between path segments
pub const NESTING_SEP: &str = ".";

/// Separator between sub-expressions of a template value
pub const INFIELD_SEP: &str = ";";

// Namespace tokens recognized as the leading segment of a template path.
pub const NS_REQUEST: &str = "*req";
pub const NS_EVENT_REQUEST: &str = "*ereq";
pub const NS_EVENT_REPLY: &str = "*erep";
pub const NS_PROTO_REQUEST: &str = "*preq";
pub const NS_PROTO_REPLY: &str = "*prep";
pub const NS_REPLY: &str = "*rep";
pub const NS_VARS: &str = "*vars";
pub const NS_TMP: &str = "*tmp";
pub const NS_CACHE: &str = "*uch";
pub const NS_HEADER: &str = "*hdr";
pub const NS_TRAILER: &str = "*trl";

/// One parsed path segment, optionally carrying an index suffix
/// (`name[2]` selects element 2 of the sequence stored at `name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathToken {
    pub name: String,
    pub index: Option<usize>,
}

impl PathToken {
    /// Parse a raw segment; a malformed bracket suffix is kept literal
    pub fn parse(seg: &str) -> Self {
        if let Some(open) = seg.rfind('[') {
            if let Some(stripped) = seg.strip_suffix(']') {
                if let Ok(idx) = stripped[open + 1..].parse::<usize>() {
                    return Self {
                        name: seg[..open].to_string(),
                        index: Some(idx),
                    };
                }
            }
        }
        Self {
            name: seg.to_string(),
            index: None,
        }
    }

    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: None,
        }
    }
}

impl std::fmt::Display for PathToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(idx) => write!(f, "{}[{}]", self.name, idx),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parse a dotted path into tokens; the empty path is an error
pub fn parse_path(path: &str) -> Result<Vec<PathToken>> {
    if path.is_empty() {
        return Err(CmteError::EmptyPath);
    }
    Ok(path.split(NESTING_SEP).map(PathToken::parse).collect())
}

/// Join tokens back into the dotted representation
pub fn join_path(tokens: &[PathToken]) -> String {
    tokens
        .iter()
        .map(PathToken::to_string)
        .collect::<Vec<_>>()
        .join(NESTING_SEP)
}

/// Plain segment names of a token list, index suffixes dropped
pub fn path_names(tokens: &[PathToken]) -> Vec<String> {
    tokens.iter().map(|t| t.name.clone()).collect()
}

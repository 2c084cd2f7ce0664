use regex::Regex;

use cmte_core::error::{CmteError, Result};
use cmte_core::path::{parse_path, PathToken};
use cmte_core::provider::DataProvider;
use cmte_core::value::{duration_seconds, format_duration, FieldValue};

/// Inline post-processing converter applied to a resolved reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Render a duration as whole seconds (`3m` resolves to `180`)
    DurationSeconds,
    /// Render a duration as its nanosecond count
    DurationNanoseconds,
    /// Render a duration in compound units (`90s` resolves to `1m30s`)
    Duration,
}

impl Converter {
    pub fn from_token(tok: &str) -> Result<Self> {
        match tok {
            "*duration_seconds" => Ok(Self::DurationSeconds),
            "*duration_nanoseconds" => Ok(Self::DurationNanoseconds),
            "*duration" => Ok(Self::Duration),
            other => Err(CmteError::UnsupportedConverter(other.to_string())),
        }
    }

    pub fn apply(&self, val: &FieldValue) -> Result<String> {
        let ns = val
            .as_duration()
            .ok_or_else(|| CmteError::InvalidDuration(val.to_string()))?;
        Ok(match self {
            Self::DurationSeconds => duration_seconds(ns),
            Self::DurationNanoseconds => ns.to_string(),
            Self::Duration => format_duration(ns),
        })
    }
}

/// Compiled sed-style find/replace attached to a reference
#[derive(Debug, Clone)]
pub struct RegexSub {
    re: Regex,
    repl: String,
}

impl RegexSub {
    // sed-style s/// without the /g flag: first match only
    fn apply(&self, input: &str) -> String {
        self.re.replace(input, self.repl.as_str()).into_owned()
    }
}

/// One compiled sub-expression of a template value
#[derive(Debug, Clone)]
pub enum ValueExpr {
    /// Verbatim text
    Literal(String),
    /// `~`-prefixed path reference with optional converter chain and
    /// substitutions, e.g. `~*ereq.Usage{*duration_seconds}` or
    /// `~*req.CC-Time:s/(.*)/${1}s/`
    Ref {
        raw: String,
        tokens: Vec<PathToken>,
        converters: Vec<Converter>,
        subs: Vec<RegexSub>,
    },
}

impl ValueExpr {
    /// Resolve against a data provider, returning the rendered string
    pub fn resolve(&self, dp: &dyn DataProvider) -> Result<String> {
        match self {
            Self::Literal(text) => Ok(text.clone()),
            Self::Ref {
                tokens,
                converters,
                subs,
                ..
            } => {
                let val = dp.field_as_value(tokens)?;
                let mut out = if converters.is_empty() {
                    val.to_string()
                } else {
                    let mut cur = val;
                    let mut rendered = String::new();
                    for conv in converters {
                        rendered = conv.apply(&cur)?;
                        cur = FieldValue::Str(rendered.clone());
                    }
                    rendered
                };
                for sub in subs {
                    out = sub.apply(&out);
                }
                Ok(out)
            }
        }
    }
}

/// Ordered list of compiled sub-expressions making up one template value.
/// The raw form splits on `;`, brace- and substitution-aware so converter
/// chains and `s///` bodies may themselves carry separators.
#[derive(Debug, Clone, Default)]
pub struct ValueExprs {
    raw: String,
    exprs: Vec<ValueExpr>,
}

impl ValueExprs {
    pub fn compile(raw: &str) -> Result<Self> {
        let mut exprs = Vec::new();
        for rule in split_rules(raw) {
            exprs.push(compile_rule(&rule)?);
        }
        Ok(Self {
            raw: raw.to_string(),
            exprs,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Resolve and concatenate every sub-expression. With `miss_as_empty`
    /// an unresolved reference contributes the empty string, otherwise the
    /// lookup miss propagates.
    pub fn parse_value(&self, dp: &dyn DataProvider, miss_as_empty: bool) -> Result<String> {
        let mut out = String::new();
        for expr in &self.exprs {
            match expr.resolve(dp) {
                Ok(s) => out.push_str(&s),
                Err(err) if err.is_not_found() && miss_as_empty => {}
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// Resolve every sub-expression positionally, for operators taking
    /// typed argument lists; lookup misses propagate
    pub fn parse_strings(&self, dp: &dyn DataProvider) -> Result<Vec<String>> {
        self.exprs.iter().map(|expr| expr.resolve(dp)).collect()
    }
}

// Split a raw value on ';', ignoring separators inside converter braces
// and inside s/// substitution bodies.
fn split_rules(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut depth = 0u32;
    let mut pending_slashes = 0u32;
    let mut prev = '\0';
    for c in raw.chars() {
        match c {
            '{' if pending_slashes == 0 => depth += 1,
            '}' if pending_slashes == 0 => depth = depth.saturating_sub(1),
            '/' if pending_slashes > 0 && prev != '\\' => pending_slashes -= 1,
            '/' if cur.ends_with(":s") => pending_slashes = 2,
            ';' if depth == 0 && pending_slashes == 0 => {
                parts.push(std::mem::take(&mut cur));
                prev = c;
                continue;
            }
            _ => {}
        }
        cur.push(c);
        prev = c;
    }
    parts.push(cur);
    parts
}

fn compile_rule(rule: &str) -> Result<ValueExpr> {
    let Some(body) = rule.strip_prefix('~') else {
        return Ok(ValueExpr::Literal(rule.to_string()));
    };
    let (head, subs_raw) = match body.find(":s/") {
        Some(at) => (&body[..at], &body[at..]),
        None => (body, ""),
    };
    let (path_raw, convs_raw) = match head.find('{') {
        Some(at) => {
            let Some(inner) = head[at + 1..].strip_suffix('}') else {
                return Err(CmteError::InvalidExpression(rule.to_string()));
            };
            (&head[..at], inner)
        }
        None => (head, ""),
    };
    if path_raw.is_empty() {
        return Err(CmteError::InvalidExpression(rule.to_string()));
    }
    let tokens = parse_path(path_raw)?;
    let converters = convs_raw
        .split(';')
        .filter(|tok| !tok.is_empty())
        .map(Converter::from_token)
        .collect::<Result<Vec<_>>>()?;
    let subs = parse_subs(rule, subs_raw)?;
    Ok(ValueExpr::Ref {
        raw: rule.to_string(),
        tokens,
        converters,
        subs,
    })
}

fn parse_subs(rule: &str, raw: &str) -> Result<Vec<RegexSub>> {
    let mut subs = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        rest = rest
            .strip_prefix(":s/")
            .ok_or_else(|| CmteError::InvalidExpression(rule.to_string()))?;
        let (pat, after_pat) = take_until_slash(rule, rest)?;
        let (repl, after_repl) = take_until_slash(rule, after_pat)?;
        let re =
            Regex::new(&pat).map_err(|_| CmteError::InvalidExpression(rule.to_string()))?;
        subs.push(RegexSub { re, repl });
        rest = after_repl;
    }
    Ok(subs)
}

// Take characters up to the next unescaped '/', unescaping "\/"
fn take_until_slash<'a>(rule: &str, s: &'a str) -> Result<(String, &'a str)> {
    let mut out = String::new();
    let mut escaped = false;
    for (at, c) in s.char_indices() {
        if escaped {
            if c != '/' {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '/' => return Ok((out, &s[at + 1..])),
            _ => out.push(c),
        }
    }
    Err(CmteError::InvalidExpression(rule.to_string()))
}

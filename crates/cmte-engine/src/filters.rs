use std::cmp::Ordering;

use cmte_core::error::{CmteError, Result};
use cmte_core::path::parse_path;
use cmte_core::provider::DataProvider;
use cmte_core::value::parse_duration;

/// External predicate deciding whether a template entry applies to the
/// current message. The engine treats it as an opaque collaborator; an
/// empty filter list is unconditional.
pub trait FilterEvaluator {
    fn pass(&self, filters: &[String], dp: &dyn DataProvider) -> Result<bool>;
}

/// Evaluator accepting every entry, for templates without filters
#[derive(Debug, Default)]
pub struct AcceptAll;

impl FilterEvaluator for AcceptAll {
    fn pass(&self, _filters: &[String], _dp: &dyn DataProvider) -> Result<bool> {
        Ok(true)
    }
}

/// Compact evaluator for inline rules of the form `*type:~element:value`,
/// e.g. `*string:~*ereq.ToR:*voice` or `*empty:~*erep.Error:`. All rules
/// of an entry must match. A rule that cannot be parsed propagates as a
/// lookup miss naming the rule.
#[derive(Debug, Default)]
pub struct InlineFilters;

impl FilterEvaluator for InlineFilters {
    fn pass(&self, filters: &[String], dp: &dyn DataProvider) -> Result<bool> {
        for rule in filters {
            if !pass_one(rule, dp)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn pass_one(rule: &str, dp: &dyn DataProvider) -> Result<bool> {
    let (ftype, element, value) = parse_rule(rule)?;
    let elem = resolve_operand(element, dp);
    let val = resolve_operand(value, dp);
    let matched = match ftype {
        "*exists" => elem.is_some(),
        "*notexists" => elem.is_none(),
        "*empty" => elem.as_deref().map_or(true, str::is_empty),
        "*notempty" => elem.as_deref().map_or(false, |s| !s.is_empty()),
        "*string" => matches!((elem, val), (Some(e), Some(v)) if e == v),
        "*notstring" => !matches!((&elem, &val), (Some(e), Some(v)) if e == v),
        "*prefix" => matches!((elem, val), (Some(e), Some(v)) if e.starts_with(&v)),
        "*notprefix" => !matches!((&elem, &val), (Some(e), Some(v)) if e.starts_with(v)),
        "*suffix" => matches!((elem, val), (Some(e), Some(v)) if e.ends_with(&v)),
        "*notsuffix" => !matches!((&elem, &val), (Some(e), Some(v)) if e.ends_with(v)),
        "*gt" => compare(elem, val) == Some(Ordering::Greater),
        "*gte" => matches!(compare(elem, val), Some(Ordering::Greater | Ordering::Equal)),
        "*lt" => compare(elem, val) == Some(Ordering::Less),
        "*lte" => matches!(compare(elem, val), Some(Ordering::Less | Ordering::Equal)),
        _ => return Err(CmteError::NotFoundField(rule.to_string())),
    };
    Ok(matched)
}

fn parse_rule(rule: &str) -> Result<(&str, &str, &str)> {
    let mut parts = rule.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ftype), Some(element), value) if ftype.starts_with('*') && !element.is_empty() => {
            Ok((ftype, element, value.unwrap_or_default()))
        }
        _ => Err(CmteError::NotFoundField(rule.to_string())),
    }
}

// A `~`-prefixed operand resolves through the data provider; anything else
// is literal. A lookup miss yields no operand, the rule decides the rest.
fn resolve_operand(raw: &str, dp: &dyn DataProvider) -> Option<String> {
    match raw.strip_prefix('~') {
        Some(path) => {
            let tokens = parse_path(path).ok()?;
            dp.field_as_string(&tokens).ok()
        }
        None => Some(raw.to_string()),
    }
}

// Duration-aware ordering: `120` against `0s` compares on the time axis,
// plain numbers fall back to float comparison.
fn compare(elem: Option<String>, val: Option<String>) -> Option<Ordering> {
    let (elem, val) = (elem?, val?);
    if let (Ok(a), Ok(b)) = (parse_duration(&elem), parse_duration(&val)) {
        return Some(a.cmp(&b));
    }
    let (a, b) = (elem.parse::<f64>().ok()?, val.parse::<f64>().ok()?);
    a.partial_cmp(&b)
}

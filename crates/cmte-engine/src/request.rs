use std::sync::Arc;

use tracing::{debug, warn};

use cmte_cache::TtlCache;
use cmte_core::error::{CmteError, Result};
use cmte_core::navmap::{NavigableMap, ResultItem};
use cmte_core::path::{
    join_path, parse_path, path_names, PathToken, NS_CACHE, NS_EVENT_REPLY, NS_EVENT_REQUEST,
    NS_HEADER, NS_PROTO_REPLY, NS_PROTO_REQUEST, NS_REPLY, NS_REQUEST, NS_TMP, NS_TRAILER,
    NS_VARS,
};
use cmte_core::provider::DataProvider;
use cmte_core::value::{format_duration, parse_duration, parse_time, FieldValue};
use cmte_template::{FieldKind, TemplateEntry};

use crate::filters::FilterEvaluator;

/// Process-wide cache collaborator backing the cache namespace
pub type SharedCache = Arc<TtlCache<Vec<ResultItem>>>;

/// Data provider handle shared with the translation context
pub type SharedProvider = Arc<dyn DataProvider + Send + Sync>;

/// Translation context for one inbound message: the read-only data
/// provider plus one navigable container per namespace. Created once per
/// message, destroyed after the reply is emitted. Reads route through the
/// namespace prefix of the path, writes honor the operator of the entry
/// that produced the value.
#[derive(Debug, Default)]
pub struct AgentRequest {
    request: Option<SharedProvider>,
    header: Option<SharedProvider>,
    trailer: Option<SharedProvider>,
    pub vars: NavigableMap,
    pub ev_request: NavigableMap,
    pub ev_reply: NavigableMap,
    pub proto_request: NavigableMap,
    pub proto_reply: NavigableMap,
    pub reply: NavigableMap,
    pub tmp: NavigableMap,
    pub tenant: String,
    pub timezone: String,
    cache: Option<SharedCache>,
}

impl AgentRequest {
    pub fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            ..Default::default()
        }
    }

    pub fn with_request(mut self, dp: SharedProvider) -> Self {
        self.request = Some(dp);
        self
    }

    pub fn with_header(mut self, dp: SharedProvider) -> Self {
        self.header = Some(dp);
        self
    }

    pub fn with_trailer(mut self, dp: SharedProvider) -> Self {
        self.trailer = Some(dp);
        self
    }

    pub fn with_vars(mut self, vars: NavigableMap) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_ev_reply(mut self, ev_reply: NavigableMap) -> Self {
        self.ev_reply = ev_reply;
        self
    }

    pub fn with_proto_reply(mut self, proto_reply: NavigableMap) -> Self {
        self.proto_reply = proto_reply;
        self
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Execute a template entry-by-entry in declaration order. The scratch
    /// namespace clears at this boundary, so later templates start fresh
    /// while the caller can still inspect the scratch of the last run.
    pub fn set_fields(
        &mut self,
        template: &[TemplateEntry],
        filters: &dyn FilterEvaluator,
    ) -> Result<()> {
        self.tmp.clear();
        for entry in template {
            if !entry.filters.is_empty() && !filters.pass(&entry.filters, &*self)? {
                continue;
            }
            match entry.kind {
                FieldKind::None => {}
                FieldKind::Remove => self.remove_field(entry)?,
                FieldKind::RemoveAll => self.remove_all_fields(entry)?,
                _ => {
                    let out = match self.parse_field(entry) {
                        Ok(val) => val,
                        Err(err) if err.is_not_found() => {
                            if entry.mandatory {
                                warn!(tag = %entry.tag, "mandatory field missing, aborting template");
                                return Err(CmteError::NotFoundField(field_id(entry)));
                            }
                            continue;
                        }
                        Err(err) => return Err(err),
                    };
                    if out.is_empty() {
                        // mandatory-and-empty already errored in parse_field
                        continue;
                    }
                    debug!(tag = %entry.tag, path = %entry.path, "setting field");
                    self.write_field(entry, out)?;
                }
            }
            if entry.blocker {
                debug!(tag = %entry.tag, "blocker entry fired, stopping template");
                break;
            }
        }
        Ok(())
    }

    /// Evaluate the operator of one entry against the namespaces, without
    /// writing the result anywhere
    pub fn parse_field(&self, entry: &TemplateEntry) -> Result<FieldValue> {
        match entry.kind {
            FieldKind::None | FieldKind::Remove | FieldKind::RemoveAll => {
                Ok(FieldValue::Str(String::new()))
            }
            FieldKind::Variable => {
                let out = entry.value.parse_value(self, false)?;
                if out.is_empty() && entry.mandatory {
                    return Err(CmteError::EmptySourceValue(entry.tag.clone()));
                }
                Ok(FieldValue::Str(out))
            }
            FieldKind::Composed | FieldKind::Constant | FieldKind::Group => {
                let out = entry.value.parse_value(self, true)?;
                if out.is_empty() && entry.mandatory {
                    return Err(CmteError::EmptySourceValue(entry.tag.clone()));
                }
                Ok(FieldValue::Str(out))
            }
            FieldKind::Sum => self.fold_ints(entry, |acc, v| acc.checked_add(v)),
            FieldKind::Difference => self.difference(entry),
            FieldKind::Multiply => self.fold_ints(entry, |acc, v| acc.checked_mul(v)),
            FieldKind::Divide => self.fold_ints(entry, |acc, v| acc.checked_div(v)),
            FieldKind::ValueExponent => self.value_exponent(entry),
            FieldKind::UsageDifference => self.usage_difference(entry),
            FieldKind::CcUsage => self.cc_usage(entry),
        }
    }

    fn fold_ints(
        &self,
        entry: &TemplateEntry,
        op: impl Fn(i64, i64) -> Option<i64>,
    ) -> Result<FieldValue> {
        let kind = entry.kind.as_str();
        let args = entry.value.parse_strings(self)?;
        let mut vals = Vec::with_capacity(args.len());
        for arg in &args {
            let v: i64 = arg.trim().parse().map_err(|_| CmteError::InvalidInteger {
                kind,
                value: arg.clone(),
            })?;
            vals.push(v);
        }
        let (first, rest) = vals.split_first().ok_or_else(|| CmteError::InvalidArguments {
            kind,
            args: entry.value.raw().to_string(),
        })?;
        let mut acc = *first;
        for v in rest {
            acc = match (entry.kind, *v) {
                (FieldKind::Divide, 0) => return Err(CmteError::DivideByZero),
                _ => op(acc, *v).ok_or_else(|| CmteError::InvalidArguments {
                    kind,
                    args: entry.value.raw().to_string(),
                })?,
            };
        }
        Ok(FieldValue::Int(acc))
    }

    // Left fold as successive subtraction; when the first argument is a
    // timestamp the remaining arguments read as durations and the result
    // is the shifted timestamp (answer time from event time minus usage).
    fn difference(&self, entry: &TemplateEntry) -> Result<FieldValue> {
        let args = entry.value.parse_strings(self)?;
        let Some((first, rest)) = args.split_first() else {
            return Err(CmteError::InvalidArguments {
                kind: entry.kind.as_str(),
                args: entry.value.raw().to_string(),
            });
        };
        if first.trim().parse::<i64>().is_err() {
            if let Ok(start) = parse_time(first) {
                let mut total: i64 = 0;
                for arg in rest {
                    total += parse_duration(arg)
                        .map_err(|_| CmteError::InvalidDuration(arg.clone()))?;
                }
                return Ok(FieldValue::Time(start - chrono::Duration::nanoseconds(total)));
            }
        }
        self.fold_ints(entry, |acc, v| acc.checked_sub(v))
    }

    fn value_exponent(&self, entry: &TemplateEntry) -> Result<FieldValue> {
        let args = entry.value.parse_strings(self)?;
        let [value, exponent] = args.as_slice() else {
            return Err(CmteError::InvalidArguments {
                kind: entry.kind.as_str(),
                args: entry.value.raw().to_string(),
            });
        };
        let val: i64 = value
            .trim()
            .parse()
            .map_err(|_| CmteError::InvalidExponentValue(value.clone()))?;
        let exp: u32 = exponent
            .trim()
            .parse()
            .map_err(|_| CmteError::InvalidExponent(exponent.clone()))?;
        if exp > 38 {
            return Err(CmteError::InvalidExponent(exponent.clone()));
        }
        let scaled = i128::from(val) * 10i128.pow(exp);
        Ok(FieldValue::Str(scaled.to_string()))
    }

    fn usage_difference(&self, entry: &TemplateEntry) -> Result<FieldValue> {
        let args = entry.value.parse_strings(self)?;
        let [first, second] = args.as_slice() else {
            return Err(CmteError::InvalidArguments {
                kind: entry.kind.as_str(),
                args: entry.value.raw().to_string(),
            });
        };
        let t1 = parse_time(first)?;
        let t2 = parse_time(second)?;
        let ns = (t1 - t2)
            .num_nanoseconds()
            .ok_or(CmteError::UnsupportedTimeFormat)?;
        Ok(FieldValue::Str(format_duration(ns)))
    }

    // Total session usage from a credit-control interrogation: the used
    // time of this request plus one debit interval for every interrogation
    // before it. Initial and terminate requests carry no backlog, so a
    // request number at or below one clamps the multiplier to zero.
    fn cc_usage(&self, entry: &TemplateEntry) -> Result<FieldValue> {
        let args = entry.value.parse_strings(self)?;
        let [req_nr, used, debit] = args.as_slice() else {
            return Err(CmteError::InvalidArguments {
                kind: entry.kind.as_str(),
                args: entry.value.raw().to_string(),
            });
        };
        let req_nr: i64 = req_nr
            .trim()
            .parse()
            .map_err(|_| CmteError::InvalidRequestNumber(req_nr.clone()))?;
        let used_ns =
            parse_duration(used).map_err(|_| CmteError::InvalidUsedTime(used.clone()))?;
        let debit_ns =
            parse_duration(debit).map_err(|_| CmteError::InvalidDebitInterval(debit.clone()))?;
        let backlog = (req_nr - 1).max(0);
        Ok(FieldValue::Usage(used_ns + debit_ns * backlog))
    }

    fn write_field(&mut self, entry: &TemplateEntry, out: FieldValue) -> Result<()> {
        let tokens = parse_path(&entry.path)?;
        let (first, rest) = tokens.split_first().expect("parse_path never yields empty");
        let mut item = ResultItem::new(out)
            .with_path(path_names(rest))
            .branched(entry.new_branch);
        if !entry.tag.is_empty() {
            item = item.with_tag(&entry.tag);
        }
        if first.name == NS_CACHE {
            return self.write_cache(entry, rest, item);
        }
        let target = self.writable_namespace(&first.name)?;
        match entry.kind {
            FieldKind::Composed => target.compose(rest, item),
            FieldKind::Group => target.set(rest, item, false),
            _ => target.set(rest, item, true),
        }
    }

    fn writable_namespace(&mut self, ns: &str) -> Result<&mut NavigableMap> {
        match ns {
            NS_VARS => Ok(&mut self.vars),
            NS_EVENT_REQUEST => Ok(&mut self.ev_request),
            NS_EVENT_REPLY => Ok(&mut self.ev_reply),
            NS_PROTO_REQUEST => Ok(&mut self.proto_request),
            NS_PROTO_REPLY => Ok(&mut self.proto_reply),
            NS_REPLY => Ok(&mut self.reply),
            NS_TMP => Ok(&mut self.tmp),
            other => Err(CmteError::UnsupportedFieldPrefix(other.to_string())),
        }
    }

    fn write_cache(
        &self,
        entry: &TemplateEntry,
        rest: &[PathToken],
        item: ResultItem,
    ) -> Result<()> {
        if rest.is_empty() {
            return Err(CmteError::WrongPath(entry.path.clone()));
        }
        let cache = self.shared_cache()?;
        let key = join_path(rest);
        match entry.kind {
            FieldKind::Group => cache.update(&key, move |cur| {
                let mut items = cur.cloned().unwrap_or_default();
                items.push(item);
                items
            }),
            FieldKind::Composed => cache.update(&key, move |cur| match cur {
                Some(existing) if !existing.is_empty() => {
                    let mut items = existing.clone();
                    let last = items.last_mut().expect("checked non-empty");
                    last.data = FieldValue::Str(format!("{}{}", last.data, item.data));
                    items
                }
                _ => vec![item],
            }),
            _ => cache.set(&key, vec![item]),
        }
        Ok(())
    }

    fn shared_cache(&self) -> Result<&SharedCache> {
        self.cache
            .as_ref()
            .ok_or_else(|| CmteError::UnsupportedFieldPrefix(NS_CACHE.to_string()))
    }

    fn remove_field(&mut self, entry: &TemplateEntry) -> Result<()> {
        let tokens = parse_path(&entry.path)?;
        let (first, rest) = tokens.split_first().expect("parse_path never yields empty");
        if rest.is_empty() {
            return Err(CmteError::WrongPath(entry.path.clone()));
        }
        if first.name == NS_CACHE {
            self.shared_cache()?.remove(&join_path(rest));
            return Ok(());
        }
        self.writable_namespace(&first.name)?.remove(rest)
    }

    fn remove_all_fields(&mut self, entry: &TemplateEntry) -> Result<()> {
        let tokens = parse_path(&entry.path)?;
        let (first, rest) = tokens.split_first().expect("parse_path never yields empty");
        if first.name == NS_CACHE {
            let cache = self.shared_cache()?;
            if rest.is_empty() {
                cache.remove_prefix("");
            } else {
                let key = join_path(rest);
                cache.remove(&key);
                cache.remove_prefix(&format!("{key}."));
            }
            return Ok(());
        }
        self.writable_namespace(&first.name)?.remove_all(rest)
    }
}

fn field_id(entry: &TemplateEntry) -> String {
    if entry.tag.is_empty() {
        entry.path.clone()
    } else {
        entry.tag.clone()
    }
}

// Read-side namespace router: the leading path segment selects the
// container or collaborator, the remainder resolves inside it. The reply
// mirrors fall back to each other when one is unset.
impl DataProvider for AgentRequest {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        match first.name.as_str() {
            NS_REQUEST => self
                .request
                .as_deref()
                .ok_or(CmteError::NotFound)?
                .field_as_value(rest),
            NS_VARS => self.vars.field_as_value(rest),
            NS_EVENT_REQUEST => self.ev_request.field_as_value(rest),
            NS_EVENT_REPLY => {
                NavigableMap::first_field_of(&[&self.ev_reply, &self.proto_reply], rest)
            }
            NS_PROTO_REQUEST => self.proto_request.field_as_value(rest),
            NS_PROTO_REPLY => {
                NavigableMap::first_field_of(&[&self.proto_reply, &self.ev_reply], rest)
            }
            NS_REPLY => self.reply.field_as_value(rest),
            NS_TMP => self.tmp.field_as_value(rest),
            NS_CACHE => {
                let cache = self.shared_cache().map_err(|_| CmteError::NotFound)?;
                let items = cache.get(&join_path(rest)).ok_or(CmteError::NotFound)?;
                match items.as_slice() {
                    [] => Err(CmteError::NotFound),
                    [single] => Ok(single.data.clone()),
                    many => Ok(FieldValue::Seq(
                        many.iter().map(|it| it.data.clone()).collect(),
                    )),
                }
            }
            NS_HEADER => self
                .header
                .as_deref()
                .ok_or(CmteError::NotFound)?
                .field_as_value(rest),
            NS_TRAILER => self
                .trailer
                .as_deref()
                .ok_or(CmteError::NotFound)?
                .field_as_value(rest),
            other => Err(CmteError::UnsupportedFieldPrefix(other.to_string())),
        }
    }

    fn remote_host(&self) -> std::net::SocketAddr {
        match &self.request {
            Some(dp) => dp.remote_host(),
            None => std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }
}

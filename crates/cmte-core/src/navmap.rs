use crate::error::{CmteError, Result};
use crate::path::{join_path, parse_path, path_names, PathToken, NESTING_SEP};
use crate::provider::DataProvider;
use crate::value::FieldValue;

/// One stored leaf value plus its provenance: the full path it was written
/// at and the tag of the template entry that produced it. Provenance is for
/// diagnostics and downstream encoders, never for control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub data: FieldValue,
    pub path: Vec<String>,
    pub tag: Option<String>,
    pub new_branch: bool,
}

impl ResultItem {
    pub fn new(data: FieldValue) -> Self {
        Self {
            data,
            path: Vec::new(),
            tag: None,
            new_branch: false,
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn branched(mut self, new_branch: bool) -> Self {
        self.new_branch = new_branch;
        self
    }
}

/// Node of the navigable tree. Closed set: a leaf holds an ordered item
/// sequence, branches are either a single nested container or an ordered
/// sequence of containers addressed by index.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Leaf(Vec<ResultItem>),
    Map(NavigableMap),
    Maps(Vec<NavigableMap>),
}

/// Ordered, path-addressable associative container. Insertion order is
/// preserved for key enumeration and downstream encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigableMap {
    entries: Vec<(String, NodeValue)>,
}

impl NavigableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, n)| n)
    }

    fn node_mut(&mut self, name: &str) -> Option<&mut NodeValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, n)| n)
    }

    /// Insert or replace a node, keeping the original slot on replace
    pub fn insert_node(&mut self, name: &str, node: NodeValue) {
        match self.position(name) {
            Some(pos) => self.entries[pos].1 = node,
            None => self.entries.push((name.to_string(), node)),
        }
    }

    /// Resolve a path to a value. A single-item leaf yields the item's
    /// value, a multi-item leaf yields the ordered sequence; `name[i]`
    /// selects element `i`, out of range is a lookup miss.
    pub fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        let node = self.node(&first.name).ok_or(CmteError::NotFound)?;
        if rest.is_empty() {
            return match (node, first.index) {
                (NodeValue::Leaf(items), None) => leaf_value(items),
                (NodeValue::Leaf(items), Some(i)) => items
                    .get(i)
                    .map(|it| it.data.clone())
                    .ok_or(CmteError::NotFound),
                // a branch has no scalar rendering
                _ => Err(CmteError::NotFound),
            };
        }
        match (node, first.index) {
            (NodeValue::Map(m), None) => m.field_as_value(rest),
            (NodeValue::Maps(v), Some(i)) => {
                v.get(i).ok_or(CmteError::NotFound)?.field_as_value(rest)
            }
            (NodeValue::Maps(_), None) => Err(CmteError::NotFound),
            _ => Err(CmteError::WrongPath(join_path(path))),
        }
    }

    /// Resolve a path and render the value as a string
    pub fn field_as_str(&self, path: &[PathToken]) -> Result<String> {
        Ok(self.field_as_value(path)?.to_string())
    }

    /// Borrow the item sequence stored at a leaf path
    pub fn items(&self, path: &[PathToken]) -> Result<&[ResultItem]> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        let node = self.node(&first.name).ok_or(CmteError::NotFound)?;
        if rest.is_empty() {
            return match (node, first.index) {
                (NodeValue::Leaf(items), None) => Ok(items.as_slice()),
                _ => Err(CmteError::WrongPath(join_path(path))),
            };
        }
        match (node, first.index) {
            (NodeValue::Map(m), None) => m.items(rest),
            (NodeValue::Maps(v), Some(i)) => v.get(i).ok_or(CmteError::NotFound)?.items(rest),
            (NodeValue::Maps(_), None) => Err(CmteError::NotFound),
            _ => Err(CmteError::WrongPath(join_path(path))),
        }
    }

    /// Write an item at a path. Missing intermediate containers are created;
    /// traversing through a leaf is a wrong-path error. With overwrite the
    /// leaf is replaced by a single-item sequence, otherwise the item is
    /// appended to the existing sequence.
    pub fn set(&mut self, path: &[PathToken], item: ResultItem, overwrite: bool) -> Result<()> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        if rest.is_empty() {
            if first.index.is_some() {
                return Err(CmteError::WrongPath(join_path(path)));
            }
            let Some(pos) = self.position(&first.name) else {
                self.entries
                    .push((first.name.clone(), NodeValue::Leaf(vec![item])));
                return Ok(());
            };
            let is_leaf = matches!(self.entries[pos].1, NodeValue::Leaf(_));
            if is_leaf {
                if let NodeValue::Leaf(items) = &mut self.entries[pos].1 {
                    if overwrite {
                        *items = vec![item];
                    } else {
                        items.push(item);
                    }
                }
            } else if overwrite {
                self.entries[pos].1 = NodeValue::Leaf(vec![item]);
            } else {
                return Err(CmteError::WrongPath(join_path(path)));
            }
            return Ok(());
        }
        match first.index {
            None => {
                if self.position(&first.name).is_none() {
                    self.entries
                        .push((first.name.clone(), NodeValue::Map(NavigableMap::new())));
                }
                match self.node_mut(&first.name) {
                    Some(NodeValue::Map(m)) => m.set(rest, item, overwrite),
                    _ => Err(CmteError::WrongPath(join_path(path))),
                }
            }
            Some(i) => match self.node_mut(&first.name) {
                Some(NodeValue::Maps(v)) => match v.get_mut(i) {
                    Some(m) => m.set(rest, item, overwrite),
                    None => Err(CmteError::NotFound),
                },
                _ => Err(CmteError::WrongPath(join_path(path))),
            },
        }
    }

    /// String-concatenate onto the last item stored at the path, or set a
    /// fresh single-item leaf when nothing is there yet
    pub fn compose(&mut self, path: &[PathToken], item: ResultItem) -> Result<()> {
        let has_items = match self.items(path) {
            Ok(items) => !items.is_empty(),
            Err(err) if err.is_not_found() => false,
            Err(err) => return Err(err),
        };
        if !has_items {
            return self.set(path, item, true);
        }
        let items = self.items_mut(path)?;
        let last = items.last_mut().expect("leaf sequences are never empty");
        last.data = FieldValue::Str(format!("{}{}", last.data, item.data));
        if item.tag.is_some() {
            last.tag = item.tag;
        }
        Ok(())
    }

    fn items_mut(&mut self, path: &[PathToken]) -> Result<&mut Vec<ResultItem>> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        let joined = join_path(path);
        let node = self.node_mut(&first.name).ok_or(CmteError::NotFound)?;
        if rest.is_empty() {
            return match (node, first.index) {
                (NodeValue::Leaf(items), None) => Ok(items),
                _ => Err(CmteError::WrongPath(joined)),
            };
        }
        match (node, first.index) {
            (NodeValue::Map(m), None) => m.items_mut(rest),
            (NodeValue::Maps(v), Some(i)) => {
                v.get_mut(i).ok_or(CmteError::NotFound)?.items_mut(rest)
            }
            (NodeValue::Maps(_), None) => Err(CmteError::NotFound),
            _ => Err(CmteError::WrongPath(joined)),
        }
    }

    /// Delete the node at a path; an absent path is a no-op
    pub fn remove(&mut self, path: &[PathToken]) -> Result<()> {
        let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
        let Some(pos) = self.position(&first.name) else {
            return Ok(()); // already removed
        };
        if rest.is_empty() {
            match first.index {
                None => {
                    self.entries.remove(pos);
                }
                Some(i) => {
                    let drop_entry = match &mut self.entries[pos].1 {
                        NodeValue::Leaf(items) => {
                            if i < items.len() {
                                items.remove(i);
                            }
                            items.is_empty()
                        }
                        NodeValue::Maps(v) => {
                            if i < v.len() {
                                v.remove(i);
                            }
                            v.is_empty()
                        }
                        NodeValue::Map(_) => {
                            return Err(CmteError::WrongPath(join_path(path)));
                        }
                    };
                    if drop_entry {
                        self.entries.remove(pos);
                    }
                }
            }
            return Ok(());
        }
        match (&mut self.entries[pos].1, first.index) {
            (NodeValue::Map(m), None) => m.remove(rest),
            (NodeValue::Maps(v), Some(i)) => match v.get_mut(i) {
                Some(m) => m.remove(rest),
                None => Ok(()),
            },
            (NodeValue::Maps(_), None) => Ok(()),
            _ => Err(CmteError::WrongPath(join_path(path))),
        }
    }

    /// Delete every path under a prefix; the empty prefix clears the
    /// container. Sibling prefixes are untouched.
    pub fn remove_all(&mut self, prefix: &[PathToken]) -> Result<()> {
        if prefix.is_empty() {
            self.entries.clear();
            return Ok(());
        }
        self.remove(prefix)
    }

    /// Enumerate keys: shallow top-level names, or every deep leaf path
    /// with bracket notation for sequence elements
    pub fn keys(&self, deep: bool) -> Vec<String> {
        if !deep {
            return self.entries.iter().map(|(k, _)| k.clone()).collect();
        }
        let mut keys = Vec::new();
        for (name, node) in &self.entries {
            match node {
                NodeValue::Leaf(items) => {
                    if items.len() <= 1 {
                        keys.push(name.clone());
                    } else {
                        for i in 0..items.len() {
                            keys.push(format!("{name}[{i}]"));
                        }
                    }
                }
                NodeValue::Map(m) => {
                    keys.push(name.clone());
                    for sub in m.keys(true) {
                        keys.push(format!("{name}{NESTING_SEP}{sub}"));
                    }
                }
                NodeValue::Maps(v) => {
                    for (i, m) in v.iter().enumerate() {
                        let pref = format!("{name}[{i}]");
                        keys.push(pref.clone());
                        for sub in m.keys(true) {
                            keys.push(format!("{pref}{NESTING_SEP}{sub}"));
                        }
                    }
                }
            }
        }
        keys
    }

    /// Deep-merge another container into this one; on conflicting leaves
    /// the other container wins
    pub fn merge(&mut self, other: &NavigableMap) {
        for (name, node) in &other.entries {
            let merged = match (self.node_mut(name), node) {
                (Some(NodeValue::Map(a)), NodeValue::Map(b)) => {
                    a.merge(b);
                    true
                }
                _ => false,
            };
            if !merged {
                self.insert_node(name, node.clone());
            }
        }
    }

    /// All leaf items in declaration order, depth first
    pub fn values(&self) -> Vec<&ResultItem> {
        let mut out = Vec::new();
        for (_, node) in &self.entries {
            match node {
                NodeValue::Leaf(items) => out.extend(items.iter()),
                NodeValue::Map(m) => out.extend(m.values()),
                NodeValue::Maps(v) => {
                    for m in v {
                        out.extend(m.values());
                    }
                }
            }
        }
        out
    }

    /// Priority-ordered read across several containers: the first
    /// container resolving the path wins, lookup misses fall through
    pub fn first_field_of(maps: &[&NavigableMap], path: &[PathToken]) -> Result<FieldValue> {
        for m in maps {
            match m.field_as_value(path) {
                Err(err) if err.is_not_found() => continue,
                other => return other,
            }
        }
        Err(CmteError::NotFound)
    }

    /// Convenience write from a raw dotted path and plain value
    pub fn set_value(&mut self, path: &str, value: FieldValue, overwrite: bool) -> Result<()> {
        let tokens = parse_path(path)?;
        let item = ResultItem::new(value).with_path(path_names(&tokens));
        self.set(&tokens, item, overwrite)
    }
}

fn leaf_value(items: &[ResultItem]) -> Result<FieldValue> {
    match items {
        [] => Err(CmteError::NotFound),
        [single] => Ok(single.data.clone()),
        many => Ok(FieldValue::Seq(
            many.iter().map(|it| it.data.clone()).collect(),
        )),
    }
}

// Plain containers double as data providers so they can back the
// header/trailer accessors and pre-populated reply mirrors.
impl DataProvider for NavigableMap {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        NavigableMap::field_as_value(self, path)
    }
}

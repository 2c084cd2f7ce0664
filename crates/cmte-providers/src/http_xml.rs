use std::net::SocketAddr;

use quick_xml::events::Event;
use quick_xml::Reader;

use cmte_core::error::{CmteError, Result};
use cmte_core::path::PathToken;
use cmte_core::provider::DataProvider;
use cmte_core::value::FieldValue;

/// One element of the parsed XML body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

/// Data provider over an HTTP XML body: path segments descend child
/// elements by tag, `[i]` picks among same-tag siblings, and a terminal
/// segment matching no child resolves as an attribute of the current
/// element (`totalcost.amount` reads the `amount` attribute).
#[derive(Debug)]
pub struct HttpXmlProvider {
    root: XmlElement,
    remote: Option<SocketAddr>,
}

impl HttpXmlProvider {
    /// Parse the request body into an element tree
    pub fn parse(body: &str) -> Result<Self> {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    stack.push(element_from_start(&start)?);
                }
                Ok(Event::Empty(start)) => {
                    attach(&mut stack, &mut root, element_from_start(&start)?)?;
                }
                Ok(Event::Text(text)) => {
                    let unescaped = text
                        .unescape()
                        .map_err(|err| xml_error(err.to_string()))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&unescaped);
                    }
                }
                Ok(Event::End(_)) => {
                    let done = stack.pop().ok_or_else(|| {
                        xml_error("close tag without matching open".to_string())
                    })?;
                    attach(&mut stack, &mut root, done)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {} // declarations, comments, processing instructions
                Err(err) => return Err(xml_error(err.to_string())),
            }
        }
        let root = root.ok_or_else(|| xml_error("empty document".to_string()))?;
        Ok(Self { root, remote: None })
    }

    pub fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }
}

fn xml_error(reason: String) -> CmteError {
    CmteError::Config(format!("invalid xml body: {reason}"))
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| xml_error(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| xml_error(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        tag,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error("multiple document roots".to_string())),
    }
    Ok(())
}

impl DataProvider for HttpXmlProvider {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        if path.is_empty() {
            return Err(CmteError::EmptyPath);
        }
        // the document root participates in the path
        let holder = XmlElement {
            children: vec![self.root.clone()],
            ..Default::default()
        };
        resolve(&holder, path)
    }

    fn remote_host(&self) -> SocketAddr {
        self.remote
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

fn resolve(current: &XmlElement, path: &[PathToken]) -> Result<FieldValue> {
    let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
    let matches: Vec<&XmlElement> = current
        .children
        .iter()
        .filter(|c| c.tag == first.name)
        .collect();
    let selected = match first.index {
        Some(i) => matches.get(i).copied(),
        None => matches.first().copied(),
    };
    if let Some(el) = selected {
        if rest.is_empty() {
            return Ok(FieldValue::Str(el.text.trim().to_string()));
        }
        return resolve(el, rest);
    }
    // fall back to an attribute of the current element
    if rest.is_empty() && first.index.is_none() {
        if let Some((_, value)) = current.attributes.iter().find(|(k, _)| k == &first.name) {
            return Ok(FieldValue::Str(value.clone()));
        }
    }
    Err(CmteError::NotFound)
}

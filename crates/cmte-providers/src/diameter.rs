use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use cmte_core::error::{CmteError, Result};
use cmte_core::path::{join_path, PathToken};
use cmte_core::provider::DataProvider;
use cmte_core::value::FieldValue;

/// Typed AVP payload after dictionary decoding
#[derive(Debug, Clone, PartialEq)]
pub enum AvpValue {
    Utf8String(String),
    DiameterIdentity(String),
    Unsigned32(u32),
    Unsigned64(u64),
    Integer32(i32),
    Integer64(i64),
    Enumerated(i32),
    Time(DateTime<Utc>),
    OctetString(Vec<u8>),
    Grouped(Vec<DiameterAvp>),
}

impl AvpValue {
    fn as_field_value(&self) -> Result<FieldValue> {
        Ok(match self {
            Self::Utf8String(s) | Self::DiameterIdentity(s) => FieldValue::Str(s.clone()),
            Self::Unsigned32(v) => FieldValue::UInt(u64::from(*v)),
            Self::Unsigned64(v) => FieldValue::UInt(*v),
            Self::Integer32(v) => FieldValue::Int(i64::from(*v)),
            Self::Integer64(v) => FieldValue::Int(*v),
            Self::Enumerated(v) => FieldValue::Int(i64::from(*v)),
            Self::Time(t) => FieldValue::Time(*t),
            Self::OctetString(b) => FieldValue::Bytes(b.clone()),
            // a group has no scalar rendering
            Self::Grouped(_) => return Err(CmteError::NotFound),
        })
    }
}

/// Decoded Diameter AVP, named through the dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct DiameterAvp {
    pub code: u32,
    pub vendor_id: Option<u32>,
    pub name: String,
    pub value: AvpValue,
}

impl DiameterAvp {
    pub fn new(code: u32, name: &str, value: AvpValue) -> Self {
        Self {
            code,
            vendor_id: None,
            name: name.to_string(),
            value,
        }
    }

    pub fn with_vendor(mut self, vendor_id: u32) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn utf8(code: u32, name: &str, value: &str) -> Self {
        Self::new(code, name, AvpValue::Utf8String(value.to_string()))
    }

    pub fn unsigned32(code: u32, name: &str, value: u32) -> Self {
        Self::new(code, name, AvpValue::Unsigned32(value))
    }

    pub fn integer64(code: u32, name: &str, value: i64) -> Self {
        Self::new(code, name, AvpValue::Integer64(value))
    }

    pub fn enumerated(code: u32, name: &str, value: i32) -> Self {
        Self::new(code, name, AvpValue::Enumerated(value))
    }

    pub fn grouped(code: u32, name: &str, members: Vec<DiameterAvp>) -> Self {
        Self::new(code, name, AvpValue::Grouped(members))
    }
}

/// Decoded Diameter message handed over by the wire codec
#[derive(Debug, Clone, PartialEq)]
pub struct DiameterMessage {
    pub command_code: u32,
    pub application_id: u32,
    pub is_request: bool,
    pub avps: Vec<DiameterAvp>,
}

impl DiameterMessage {
    pub fn new(command_code: u32, application_id: u32, is_request: bool) -> Self {
        Self {
            command_code,
            application_id,
            is_request,
            avps: Vec::new(),
        }
    }

    pub fn push(&mut self, avp: DiameterAvp) -> &mut Self {
        self.avps.push(avp);
        self
    }

    /// First AVP carrying the given name
    pub fn avp(&self, name: &str) -> Option<&DiameterAvp> {
        self.avps.iter().find(|a| a.name == name)
    }
}

/// Data provider resolving dotted paths against a Diameter AVP tree:
/// segments descend grouped AVPs by name, `[i]` picks among repeated AVPs
#[derive(Debug)]
pub struct DiameterProvider {
    msg: DiameterMessage,
    remote: Option<SocketAddr>,
}

impl DiameterProvider {
    pub fn new(msg: DiameterMessage) -> Self {
        Self { msg, remote: None }
    }

    pub fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn message(&self) -> &DiameterMessage {
        &self.msg
    }
}

impl DataProvider for DiameterProvider {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        resolve(&self.msg.avps, path)
    }

    fn remote_host(&self) -> SocketAddr {
        self.remote
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

fn resolve(avps: &[DiameterAvp], path: &[PathToken]) -> Result<FieldValue> {
    let (first, rest) = path.split_first().ok_or(CmteError::EmptyPath)?;
    let matches: Vec<&DiameterAvp> = avps.iter().filter(|a| a.name == first.name).collect();
    let selected = match first.index {
        Some(i) => *matches.get(i).ok_or(CmteError::NotFound)?,
        None => *matches.first().ok_or(CmteError::NotFound)?,
    };
    if rest.is_empty() {
        // repeated scalar AVPs read back as the ordered sequence
        if first.index.is_none() && matches.len() > 1 {
            let vals = matches
                .iter()
                .map(|a| a.value.as_field_value())
                .collect::<Result<Vec<_>>>()?;
            return Ok(FieldValue::Seq(vals));
        }
        return selected.value.as_field_value();
    }
    match &selected.value {
        AvpValue::Grouped(members) => resolve(members, rest),
        _ => Err(CmteError::WrongPath(join_path(path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmte_core::path::parse_path;

    fn credit_control_request() -> DiameterMessage {
        let mut msg = DiameterMessage::new(272, 4, true);
        msg.push(DiameterAvp::utf8(
            263,
            "Session-Id",
            "ocs-gw;1449573472;00002",
        ));
        msg.push(DiameterAvp::grouped(
            443,
            "Subscription-Id",
            vec![
                DiameterAvp::enumerated(450, "Subscription-Id-Type", 2),
                DiameterAvp::utf8(444, "Subscription-Id-Data", "208708000004"),
                DiameterAvp::integer64(447, "Value-Digits", 20000),
            ],
        ));
        msg.push(DiameterAvp::grouped(
            446,
            "Used-Service-Unit",
            vec![DiameterAvp::unsigned32(420, "CC-Time", 250)],
        ));
        msg
    }

    fn toks(path: &str) -> Vec<PathToken> {
        parse_path(path).unwrap()
    }

    #[test]
    fn test_top_level_avp() {
        let dp = DiameterProvider::new(credit_control_request());
        assert_eq!(
            dp.field_as_string(&toks("Session-Id")).unwrap(),
            "ocs-gw;1449573472;00002"
        );
    }

    #[test]
    fn test_grouped_traversal() {
        let dp = DiameterProvider::new(credit_control_request());
        assert_eq!(
            dp.field_as_string(&toks("Subscription-Id.Subscription-Id-Data"))
                .unwrap(),
            "208708000004"
        );
        assert_eq!(
            dp.field_as_value(&toks("Subscription-Id.Value-Digits"))
                .unwrap(),
            FieldValue::Int(20000)
        );
        assert_eq!(
            dp.field_as_string(&toks("Used-Service-Unit.CC-Time")).unwrap(),
            "250"
        );
    }

    #[test]
    fn test_missing_avp() {
        let dp = DiameterProvider::new(credit_control_request());
        assert_eq!(
            dp.field_as_value(&toks("MandatoryTrue")).unwrap_err(),
            CmteError::NotFound
        );
        assert_eq!(
            dp.field_as_value(&toks("Subscription-Id.Missing")).unwrap_err(),
            CmteError::NotFound
        );
    }

    #[test]
    fn test_traversal_through_scalar_is_wrong_path() {
        let dp = DiameterProvider::new(credit_control_request());
        assert_eq!(
            dp.field_as_value(&toks("Session-Id.Deeper")).unwrap_err(),
            CmteError::WrongPath("Session-Id.Deeper".to_string())
        );
    }

    #[test]
    fn test_repeated_avps_by_index() {
        let mut msg = DiameterMessage::new(272, 4, true);
        msg.push(DiameterAvp::utf8(461, "Service-Context-Id", "first"));
        msg.push(DiameterAvp::utf8(461, "Service-Context-Id", "second"));
        let dp = DiameterProvider::new(msg);

        assert_eq!(
            dp.field_as_string(&toks("Service-Context-Id[1]")).unwrap(),
            "second"
        );
        assert_eq!(
            dp.field_as_value(&toks("Service-Context-Id[4]")).unwrap_err(),
            CmteError::NotFound
        );
        assert_eq!(
            dp.field_as_value(&toks("Service-Context-Id")).unwrap(),
            FieldValue::Seq(vec![
                FieldValue::Str("first".into()),
                FieldValue::Str("second".into())
            ])
        );
    }

    #[test]
    fn test_grouped_terminal_has_no_scalar() {
        let dp = DiameterProvider::new(credit_control_request());
        assert_eq!(
            dp.field_as_value(&toks("Subscription-Id")).unwrap_err(),
            CmteError::NotFound
        );
    }
}

use std::net::SocketAddr;

use cmte_core::error::{CmteError, Result};
use cmte_core::path::{join_path, PathToken};
use cmte_core::provider::DataProvider;
use cmte_core::value::FieldValue;

// RADIUS packet codes
pub const ACCESS_REQUEST: u8 = 1;
pub const ACCOUNTING_REQUEST: u8 = 4;

/// Decoded RADIUS attribute-value pair
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusAttribute {
    pub name: String,
    pub vendor: Option<String>,
    pub value: String,
}

impl RadiusAttribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            vendor: None,
            value: value.to_string(),
        }
    }

    pub fn vendor(name: &str, vendor: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            vendor: Some(vendor.to_string()),
            value: value.to_string(),
        }
    }
}

/// Decoded RADIUS packet handed over by the wire codec
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusPacket {
    pub code: u8,
    pub identifier: u8,
    pub attributes: Vec<RadiusAttribute>,
}

impl RadiusPacket {
    pub fn new(code: u8, identifier: u8) -> Self {
        Self {
            code,
            identifier,
            attributes: Vec::new(),
        }
    }

    pub fn push(&mut self, attr: RadiusAttribute) -> &mut Self {
        self.attributes.push(attr);
        self
    }
}

/// Data provider scanning the flat RADIUS attribute list: a single-segment
/// path addresses by attribute name, a two-segment path by `Vendor.Attr`,
/// `[i]` picks among repeated attributes
#[derive(Debug)]
pub struct RadiusProvider {
    pkt: RadiusPacket,
    remote: Option<SocketAddr>,
}

impl RadiusProvider {
    pub fn new(pkt: RadiusPacket) -> Self {
        Self { pkt, remote: None }
    }

    pub fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }
}

impl DataProvider for RadiusProvider {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        let (vendor, attr) = match path {
            [attr] => (None, attr),
            [vendor, attr] => (Some(vendor), attr),
            [] => return Err(CmteError::EmptyPath),
            _ => return Err(CmteError::WrongPath(join_path(path))),
        };
        if let Some(vendor) = vendor {
            if vendor.index.is_some() {
                return Err(CmteError::WrongPath(join_path(path)));
            }
        }
        let matches: Vec<&RadiusAttribute> = self
            .pkt
            .attributes
            .iter()
            .filter(|a| {
                a.name == attr.name
                    && vendor.map_or(true, |v| a.vendor.as_deref() == Some(v.name.as_str()))
            })
            .collect();
        match attr.index {
            Some(i) => matches
                .get(i)
                .map(|a| FieldValue::Str(a.value.clone()))
                .ok_or(CmteError::NotFound),
            None => match matches.as_slice() {
                [] => Err(CmteError::NotFound),
                [single] => Ok(FieldValue::Str(single.value.clone())),
                many => Ok(FieldValue::Seq(
                    many.iter()
                        .map(|a| FieldValue::Str(a.value.clone()))
                        .collect(),
                )),
            },
        }
    }

    fn remote_host(&self) -> SocketAddr {
        self.remote
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmte_core::path::parse_path;

    fn accounting_packet() -> RadiusPacket {
        let mut pkt = RadiusPacket::new(ACCOUNTING_REQUEST, 1);
        pkt.push(RadiusAttribute::new("User-Name", "alice"));
        pkt.push(RadiusAttribute::vendor("Cisco-NAS-Port", "Cisco", "NAS-PORT-01"));
        pkt.push(RadiusAttribute::new("Framed-IP-Address", "10.0.0.1"));
        pkt.push(RadiusAttribute::new("Framed-IP-Address", "10.0.0.2"));
        pkt
    }

    fn toks(path: &str) -> Vec<PathToken> {
        parse_path(path).unwrap()
    }

    #[test]
    fn test_lookup_by_name() {
        let dp = RadiusProvider::new(accounting_packet());
        assert_eq!(dp.field_as_string(&toks("User-Name")).unwrap(), "alice");
    }

    #[test]
    fn test_lookup_by_vendor_and_name() {
        let dp = RadiusProvider::new(accounting_packet());
        assert_eq!(
            dp.field_as_string(&toks("Cisco.Cisco-NAS-Port")).unwrap(),
            "NAS-PORT-01"
        );
        assert_eq!(
            dp.field_as_value(&toks("Other.Cisco-NAS-Port")).unwrap_err(),
            CmteError::NotFound
        );
    }

    #[test]
    fn test_repeated_attributes() {
        let dp = RadiusProvider::new(accounting_packet());
        assert_eq!(
            dp.field_as_string(&toks("Framed-IP-Address[1]")).unwrap(),
            "10.0.0.2"
        );
        assert_eq!(
            dp.field_as_value(&toks("Framed-IP-Address")).unwrap(),
            FieldValue::Seq(vec![
                FieldValue::Str("10.0.0.1".into()),
                FieldValue::Str("10.0.0.2".into())
            ])
        );
        assert_eq!(
            dp.field_as_value(&toks("Framed-IP-Address[9]")).unwrap_err(),
            CmteError::NotFound
        );
    }

    #[test]
    fn test_missing_attribute() {
        let dp = RadiusProvider::new(accounting_packet());
        assert_eq!(
            dp.field_as_value(&toks("MandatoryTrue")).unwrap_err(),
            CmteError::NotFound
        );
    }
}

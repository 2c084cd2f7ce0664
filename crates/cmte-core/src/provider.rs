use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::Result;
use crate::path::PathToken;
use crate::value::FieldValue;

/// Read-only capability resolving a dotted path to a value for one decoded
/// wire message. Implemented once per wire format; the translation engine
/// depends only on this contract, never on protocol internals.
pub trait DataProvider: std::fmt::Debug {
    /// Resolve a path to a scalar or ordered sequence of scalars
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue>;

    /// Resolve a path and render it as its canonical wire string
    fn field_as_string(&self, path: &[PathToken]) -> Result<String> {
        Ok(self.field_as_value(path)?.to_string())
    }

    /// Peer address the message arrived from
    fn remote_host(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CmteError;

    #[derive(Debug)]
    struct SingleField;

    impl DataProvider for SingleField {
        fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
            if path.len() == 1 && path[0].name == "Account" {
                return Ok(FieldValue::Str("1001".to_string()));
            }
            Err(CmteError::NotFound)
        }
    }

    #[test]
    fn test_default_string_rendering() {
        let dp = SingleField;
        let path = [PathToken::plain("Account")];
        assert_eq!(dp.field_as_string(&path).unwrap(), "1001");
    }

    #[test]
    fn test_default_remote_host() {
        let dp = SingleField;
        assert_eq!(dp.remote_host().port(), 0);
    }
}

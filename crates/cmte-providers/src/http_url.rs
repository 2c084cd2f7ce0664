use std::net::SocketAddr;

use url::form_urlencoded;

use cmte_core::error::{CmteError, Result};
use cmte_core::path::{join_path, PathToken};
use cmte_core::provider::DataProvider;
use cmte_core::value::FieldValue;

/// Data provider over the query parameters of an HTTP request line.
/// Parameter names address directly, `[i]` picks among repeated parameters.
#[derive(Debug)]
pub struct HttpUrlProvider {
    pairs: Vec<(String, String)>,
    remote: Option<SocketAddr>,
}

impl HttpUrlProvider {
    /// Build from a raw query string (percent-encoded, no leading `?`)
    pub fn from_query(query: &str) -> Self {
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            pairs,
            remote: None,
        }
    }

    /// Build from a full request URL
    pub fn from_url(raw: &str) -> Result<Self> {
        let parsed = url::Url::parse(raw)
            .map_err(|err| CmteError::Config(format!("invalid url <{raw}>: {err}")))?;
        Ok(Self::from_query(parsed.query().unwrap_or_default()))
    }

    pub fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }
}

impl DataProvider for HttpUrlProvider {
    fn field_as_value(&self, path: &[PathToken]) -> Result<FieldValue> {
        let param = match path {
            [param] => param,
            [] => return Err(CmteError::EmptyPath),
            _ => return Err(CmteError::WrongPath(join_path(path))),
        };
        let matches: Vec<&str> = self
            .pairs
            .iter()
            .filter(|(k, _)| k == &param.name)
            .map(|(_, v)| v.as_str())
            .collect();
        match param.index {
            Some(i) => matches
                .get(i)
                .map(|v| FieldValue::Str((*v).to_string()))
                .ok_or(CmteError::NotFound),
            None => match matches.as_slice() {
                [] => Err(CmteError::NotFound),
                [single] => Ok(FieldValue::Str((*single).to_string())),
                many => Ok(FieldValue::Seq(
                    many.iter()
                        .map(|v| FieldValue::Str((*v).to_string()))
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

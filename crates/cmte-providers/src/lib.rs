pub mod diameter;
pub mod http_url;
pub mod http_xml;
pub mod radius;

// Re-export commonly used types
pub use diameter::{AvpValue, DiameterAvp, DiameterMessage, DiameterProvider};
pub use http_url::HttpUrlProvider;
pub use http_xml::HttpXmlProvider;
pub use radius::{RadiusAttribute, RadiusPacket, RadiusProvider};

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use cmte_template::{FieldKind, TemplateEntry};

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Template error in <{tag}>: {reason}")]
    TemplateError { tag: String, reason: String },
}

/// Raw declaration of one field-construction rule, as written in the
/// template configuration. Compiles into an executable entry at load time
/// so unsupported operator kinds and malformed expressions surface before
/// any message is processed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TemplateEntryDecl {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub path: String,
    #[validate(length(min = 1))]
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub blocker: bool,
    #[serde(default)]
    pub new_branch: bool,
}

impl TemplateEntryDecl {
    pub fn compile(&self) -> Result<TemplateEntry, ConfigError> {
        let template_error = |reason: String| ConfigError::TemplateError {
            tag: self.tag.clone(),
            reason,
        };
        let kind =
            FieldKind::from_str(&self.kind).map_err(|err| template_error(err.to_string()))?;
        let mut entry = TemplateEntry::new(&self.tag, &self.path, kind, &self.value)
            .map_err(|err| template_error(err.to_string()))?;
        entry.filters = self.filters.clone();
        entry.mandatory = self.mandatory;
        entry.blocker = self.blocker;
        entry.new_branch = self.new_branch;
        Ok(entry)
    }
}

/// One named translation template: an ordered rule list applied to every
/// message the template is selected for
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TemplateDecl {
    #[validate(length(min = 1))]
    pub id: String,
    pub fields: Vec<TemplateEntryDecl>,
}

impl TemplateDecl {
    pub fn compile(&self) -> Result<Vec<TemplateEntry>, ConfigError> {
        self.fields.iter().map(TemplateEntryDecl::compile).collect()
    }
}

/// Translation configuration: tenant defaults plus the ordered template set
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranslationConfig {
    #[validate(length(min = 1))]
    pub tenant: String,
    #[serde(default)]
    pub timezone: String,
    pub templates: Vec<TemplateDecl>,
}

impl TranslationConfig {
    /// Compile the template carrying the given id
    pub fn compile_template(&self, id: &str) -> Result<Vec<TemplateEntry>, ConfigError> {
        let decl = self
            .templates
            .iter()
            .find(|tpl| tpl.id == id)
            .ok_or_else(|| ConfigError::LoadError(format!("unknown template: {id}")))?;
        decl.compile()
    }

    /// Compile every template, keeping declaration order
    pub fn compile_all(&self) -> Result<Vec<(String, Vec<TemplateEntry>)>, ConfigError> {
        self.templates
            .iter()
            .map(|tpl| Ok((tpl.id.clone(), tpl.compile()?)))
            .collect()
    }
}

/// Load configuration from file, with CMTE_-prefixed environment overrides
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("CMTE"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from a YAML string
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
tenant: telco.example.org
timezone: UTC
templates:
  - id: diameter_ccr
    fields:
      - tag: Tenant
        path: "*rep.Tenant"
        type: "*constant"
        value: "telco.example.org"
      - tag: Account
        path: "*rep.Account"
        type: "*variable"
        value: "~*ereq.Account"
        mandatory: true
      - tag: Usage
        path: "*ereq.Usage"
        type: "*cc_usage"
        value: "~*req.CC-Request-Number;~*req.Used-Service-Unit.CC-Time:s/(.*)/${1}s/;5m"
        filters:
          - "*string:~*ereq.ToR:*voice"
      - tag: Stop
        type: "*none"
        blocker: true
"#;

    #[test]
    fn test_load_and_compile() {
        let cfg: TranslationConfig = load_from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.tenant, "telco.example.org");
        assert_eq!(cfg.templates.len(), 1);

        let tpl = cfg.compile_template("diameter_ccr").unwrap();
        assert_eq!(tpl.len(), 4);
        assert_eq!(tpl[0].kind, FieldKind::Constant);
        assert!(tpl[1].mandatory);
        assert_eq!(tpl[2].kind, FieldKind::CcUsage);
        assert_eq!(tpl[2].value.len(), 3);
        assert_eq!(tpl[2].filters.len(), 1);
        assert!(tpl[3].blocker);
    }

    #[test]
    fn test_unknown_template_id() {
        let cfg: TranslationConfig = load_from_yaml(SAMPLE).unwrap();
        assert!(cfg.compile_template("radius_acct").is_err());
    }

    #[test]
    fn test_unsupported_kind_fails_at_load() {
        let yaml = r#"
tenant: telco.example.org
templates:
  - id: bad
    fields:
      - tag: Broken
        path: "*rep.Broken"
        type: "*bogus"
        value: "x"
"#;
        let cfg: TranslationConfig = load_from_yaml(yaml).unwrap();
        let err = cfg.compile_template("bad").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Template error in <Broken>: unsupported type: <*bogus>"
        );
    }

    #[test]
    fn test_malformed_expression_fails_at_load() {
        let decl = TemplateEntryDecl {
            tag: "Bad".to_string(),
            path: "*rep.Bad".to_string(),
            kind: "*variable".to_string(),
            value: "~".to_string(),
            filters: Vec::new(),
            mandatory: false,
            blocker: false,
            new_branch: false,
        };
        assert!(decl.compile().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_tenant() {
        let yaml = r#"
tenant: ""
templates: []
"#;
        let result: Result<TranslationConfig, _> = load_from_yaml(yaml);
        match result {
            Err(ConfigError::ValidationError(_)) => (),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_decl_serde_round_trip() {
        let cfg: TranslationConfig = load_from_yaml(SAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: TranslationConfig = load_from_yaml(&yaml).unwrap();
        assert_eq!(back.templates[0].fields.len(), cfg.templates[0].fields.len());
    }
}

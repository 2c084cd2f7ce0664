use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cmte_core::CmteError;

/// Construction operator of a template entry. Closed set dispatched once
/// per entry; new operators extend the enum so the compiler checks
/// exhaustiveness at every dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "*none")]
    None,
    #[serde(rename = "*variable")]
    Variable,
    #[serde(rename = "*composed")]
    Composed,
    #[serde(rename = "*constant")]
    Constant,
    #[serde(rename = "*group")]
    Group,
    #[serde(rename = "*remove")]
    Remove,
    #[serde(rename = "*remove_all")]
    RemoveAll,
    #[serde(rename = "*sum")]
    Sum,
    #[serde(rename = "*difference")]
    Difference,
    #[serde(rename = "*multiply")]
    Multiply,
    #[serde(rename = "*divide")]
    Divide,
    #[serde(rename = "*value_exponent")]
    ValueExponent,
    #[serde(rename = "*usage_difference")]
    UsageDifference,
    #[serde(rename = "*cc_usage")]
    CcUsage,
}

impl FieldKind {
    /// The configuration token of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "*none",
            Self::Variable => "*variable",
            Self::Composed => "*composed",
            Self::Constant => "*constant",
            Self::Group => "*group",
            Self::Remove => "*remove",
            Self::RemoveAll => "*remove_all",
            Self::Sum => "*sum",
            Self::Difference => "*difference",
            Self::Multiply => "*multiply",
            Self::Divide => "*divide",
            Self::ValueExponent => "*value_exponent",
            Self::UsageDifference => "*usage_difference",
            Self::CcUsage => "*cc_usage",
        }
    }
}

impl FromStr for FieldKind {
    type Err = CmteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*none" => Ok(Self::None),
            "*variable" => Ok(Self::Variable),
            "*composed" => Ok(Self::Composed),
            "*constant" => Ok(Self::Constant),
            "*group" => Ok(Self::Group),
            "*remove" => Ok(Self::Remove),
            "*remove_all" => Ok(Self::RemoveAll),
            "*sum" => Ok(Self::Sum),
            "*difference" => Ok(Self::Difference),
            "*multiply" => Ok(Self::Multiply),
            "*divide" => Ok(Self::Divide),
            "*value_exponent" => Ok(Self::ValueExponent),
            "*usage_difference" => Ok(Self::UsageDifference),
            "*cc_usage" => Ok(Self::CcUsage),
            other => Err(CmteError::UnsupportedFieldKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

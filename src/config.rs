use serde::Deserialize;

use crate::error::TransformError;
use crate::registry::RegistrySource;

/// Plugin options, read from the JSON config handed over by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub assertion_name: String,
    pub assertion_module: String,
    pub helper_module: String,
    pub helper_name: String,
    pub dev_flag: String,
    pub codes_path: Option<String>,
    pub codes: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assertion_name: "invariant".to_string(),
            assertion_module: "invariant".to_string(),
            helper_module: "reactProdInvariant".to_string(),
            helper_name: "prodInvariant".to_string(),
            dev_flag: "__DEV__".to_string(),
            codes_path: None,
            codes: None,
        }
    }
}

impl Config {
    pub fn from_json(raw: &str) -> Result<Self, TransformError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Inline `codes` win over `codesPath`; with neither, every lookup misses.
    pub fn registry_source(&self) -> RegistrySource {
        if let Some(codes) = &self.codes {
            return RegistrySource::Inline(codes.clone());
        }
        match &self.codes_path {
            Some(path) => RegistrySource::File(path.into()),
            None => RegistrySource::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = Config::from_json("").unwrap();
        assert_eq!(cfg.assertion_name, "invariant");
        assert_eq!(cfg.dev_flag, "__DEV__");
        assert!(matches!(cfg.registry_source(), RegistrySource::Empty));
    }

    #[test]
    fn partial_config_keeps_remaining_defaults() {
        let cfg = Config::from_json(r#"{"assertionName":"check","codesPath":"codes.json"}"#).unwrap();
        assert_eq!(cfg.assertion_name, "check");
        assert_eq!(cfg.helper_module, "reactProdInvariant");
        assert!(matches!(cfg.registry_source(), RegistrySource::File(_)));
    }

    #[test]
    fn inline_codes_win_over_path() {
        let cfg = Config::from_json(r#"{"codesPath":"codes.json","codes":{"0":"boom"}}"#).unwrap();
        assert!(matches!(cfg.registry_source(), RegistrySource::Inline(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, TransformError::Config(_)));
    }
}

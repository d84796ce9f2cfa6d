//! JSON configuration of one processor.
//!
//! ```json
//! {
//!   "device": "/dev/ttyUSB0",
//!   "unique_id": "rotel_rsp1570",
//!   "name": "Lounge",
//!   "model_spec": {
//!     "model": "rsp1572",
//!     "source_aliases": { "VIDEO 1": "CATV", "TUNER": null }
//!   }
//! }
//! ```
//!
//! Top-level `source_aliases` is shorthand for an RSP-1570 and cannot be
//! combined with `model_spec`.

use crate::error::{Result, RotelError};
use crate::model::{ModelId, RotelModelMeta};
use crate::source_map::{SourceAliases, SourceMap};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Rotel RSP-1570";

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Model and its source aliases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub model: ModelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_aliases: Option<SourceAliases>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotelConfig {
    /// Serial port path
    pub device: String,
    pub unique_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_aliases: Option<SourceAliases>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_spec: Option<ModelSpec>,
}

impl RotelConfig {
    /// Parse and validate a configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(RotelError::InvalidConfig("device must not be empty".to_string()));
        }
        if self.unique_id.is_empty() {
            return Err(RotelError::InvalidConfig("unique_id must not be empty".to_string()));
        }
        if self.source_aliases.is_some() && self.model_spec.is_some() {
            return Err(RotelError::InvalidConfig(
                "two or more values in the same group of exclusion 'model_spec'".to_string(),
            ));
        }

        let meta = self.meta();
        if let Some(unknown) = self
            .aliases()
            .and_then(|aliases| aliases.keys().find(|name| meta.source(name).is_none()))
        {
            return Err(RotelError::InvalidConfig(format!(
                "not a valid value for source_aliases of {}: {}",
                meta.model_id, unknown
            )));
        }
        Ok(())
    }

    /// The configured model, RSP-1570 unless a model spec says otherwise
    pub fn model(&self) -> ModelId {
        self.model_spec
            .as_ref()
            .map(|spec| spec.model)
            .unwrap_or_default()
    }

    pub fn meta(&self) -> &'static RotelModelMeta {
        self.model().meta()
    }

    /// Source aliases from wherever they were given
    pub fn aliases(&self) -> Option<&SourceAliases> {
        match &self.model_spec {
            Some(spec) => spec.source_aliases.as_ref(),
            None => self.source_aliases.as_ref(),
        }
    }

    pub fn source_map(&self) -> Result<SourceMap> {
        SourceMap::new(self.meta(), self.aliases())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aliases_rsp1570() -> serde_json::Value {
        json!({
            "TUNER": null,
            "TAPE": null,
            "MULTI": null,
            "VIDEO 1": "CATV",
            "VIDEO 2": "NMT",
            "VIDEO 3": "APPLE TV",
            "VIDEO 4": "FIRE TV",
            "VIDEO 5": "BLU RAY",
        })
    }

    fn parse(value: serde_json::Value) -> Result<RotelConfig> {
        RotelConfig::from_json(&value.to_string())
    }

    #[test]
    fn simple_config_gets_defaults() {
        let config = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
        }))
        .unwrap();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.unique_id, "rotel_rsp1570");
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.model(), ModelId::Rsp1570);
        assert_eq!(config.source_map().unwrap().len(), crate::model::RSP1570.sources.len());
    }

    #[test]
    fn top_level_aliases() {
        let config = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "name": "My Name",
            "source_aliases": aliases_rsp1570(),
        }))
        .unwrap();
        assert_eq!(config.name, "My Name");
        let aliases = config.aliases().unwrap();
        assert_eq!(aliases["VIDEO 1"].as_deref(), Some("CATV"));
        assert_eq!(aliases["TUNER"], None);
        assert_eq!(config.source_map().unwrap().command_for("NMT"), Some("SOURCE_VIDEO_2"));
    }

    #[test]
    fn model_spec_aliases() {
        let config = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "name": "My Name",
            "model_spec": {
                "model": "rsp1570",
                "source_aliases": aliases_rsp1570(),
            },
        }))
        .unwrap();
        assert_eq!(config.model(), ModelId::Rsp1570);
        assert_eq!(config.aliases().map(|a| a.len()), Some(8));
    }

    #[test]
    fn aliases_and_model_spec_are_exclusive() {
        let err = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "source_aliases": aliases_rsp1570(),
            "model_spec": {
                "model": "rsp1570",
                "source_aliases": aliases_rsp1570(),
            },
        }))
        .unwrap_err();
        assert!(matches!(err, RotelError::InvalidConfig(ref msg)
            if msg == "two or more values in the same group of exclusion 'model_spec'"));
    }

    #[test]
    fn rsp1572_has_no_tape() {
        let err = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "model_spec": {
                "model": "rsp1572",
                "source_aliases": aliases_rsp1570(),
            },
        }))
        .unwrap_err();
        assert!(matches!(err, RotelError::InvalidConfig(ref msg) if msg.ends_with("TAPE")));
    }

    #[test]
    fn rsp1572_model_spec_without_aliases() {
        let config = parse(json!({
            "device": "/dev/ttyUSB1",
            "unique_id": "rotel_rsp1572",
            "model_spec": { "model": "rsp1572" },
        }))
        .unwrap();
        assert_eq!(config.model(), ModelId::Rsp1572);
        assert!(config.meta().supports_smart_display);
        assert_eq!(config.source_map().unwrap().command_for("USB"), Some("SOURCE_USB"));
    }

    #[test]
    fn missing_device_is_rejected() {
        let err = parse(json!({ "unique_id": "rotel_rsp1570" })).unwrap_err();
        assert!(matches!(err, RotelError::Json(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "baud": 9600,
        }))
        .unwrap_err();
        assert!(matches!(err, RotelError::Json(_)));

        let err = parse(json!({
            "device": "/dev/ttyUSB0",
            "unique_id": "rotel_rsp1570",
            "model_spec": { "model": "rsp1590" },
        }))
        .unwrap_err();
        assert!(matches!(err, RotelError::Json(_)));
    }
}

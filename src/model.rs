use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported processor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    #[default]
    Rsp1570,
    Rsp1572,
}

impl ModelId {
    /// Identifier used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Rsp1570 => "rsp1570",
            ModelId::Rsp1572 => "rsp1572",
        }
    }

    /// Static metadata for this model
    pub fn meta(&self) -> &'static RotelModelMeta {
        match self {
            ModelId::Rsp1570 => &RSP1570,
            ModelId::Rsp1572 => &RSP1572,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input source as the processor names it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
    /// Name shown on the front panel
    pub standard_name: &'static str,

    /// Symbolic command that selects this source
    pub command_code: &'static str,
}

/// Per-model protocol metadata
#[derive(Debug, PartialEq, Eq)]
pub struct RotelModelMeta {
    pub model_id: ModelId,

    /// Device id byte carried in every frame
    pub device_id: u8,

    /// Highest raw volume the device reports or accepts
    pub max_volume: u8,

    /// Serial line speed (8N1, no flow control)
    pub baud_rate: u32,

    /// Standard input sources in front-panel order
    pub sources: &'static [SourceMeta],

    /// Whether the model emits smart display messages
    pub supports_smart_display: bool,
}

impl RotelModelMeta {
    /// Look up a standard source by its front-panel name
    pub fn source(&self, standard_name: &str) -> Option<&'static SourceMeta> {
        self.sources.iter().find(|s| s.standard_name == standard_name)
    }
}

const fn source(standard_name: &'static str, command_code: &'static str) -> SourceMeta {
    SourceMeta {
        standard_name,
        command_code,
    }
}

static RSP1570_SOURCES: [SourceMeta; 9] = [
    source("CD", "SOURCE_CD"),
    source("TUNER", "SOURCE_TUNER"),
    source("TAPE", "SOURCE_TAPE"),
    source("VIDEO 1", "SOURCE_VIDEO_1"),
    source("VIDEO 2", "SOURCE_VIDEO_2"),
    source("VIDEO 3", "SOURCE_VIDEO_3"),
    source("VIDEO 4", "SOURCE_VIDEO_4"),
    source("VIDEO 5", "SOURCE_VIDEO_5"),
    source("MULTI", "SOURCE_MULTI_INPUT"),
];

static RSP1572_SOURCES: [SourceMeta; 9] = [
    source("CD", "SOURCE_CD"),
    source("TUNER", "SOURCE_TUNER"),
    source("VIDEO 1", "SOURCE_VIDEO_1"),
    source("VIDEO 2", "SOURCE_VIDEO_2"),
    source("VIDEO 3", "SOURCE_VIDEO_3"),
    source("VIDEO 4", "SOURCE_VIDEO_4"),
    source("VIDEO 5", "SOURCE_VIDEO_5"),
    source("USB", "SOURCE_USB"),
    source("MULTI", "SOURCE_MULTI_INPUT"),
];

/// Rotel RSP-1570
pub static RSP1570: RotelModelMeta = RotelModelMeta {
    model_id: ModelId::Rsp1570,
    device_id: 0xA3,
    max_volume: 96,
    baud_rate: 115_200,
    sources: &RSP1570_SOURCES,
    supports_smart_display: false,
};

/// Rotel RSP-1572
pub static RSP1572: RotelModelMeta = RotelModelMeta {
    model_id: ModelId::Rsp1572,
    device_id: 0xA5,
    max_volume: 96,
    baud_rate: 115_200,
    sources: &RSP1572_SOURCES,
    supports_smart_display: true,
};

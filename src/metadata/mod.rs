pub mod exif;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

/// Embedded metadata. Each typed field is present only when the tag exists
/// and parses; `tags` carries every primary-IFD tag as display text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResult {
    #[serde(rename = "Make", skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(rename = "Model", skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(rename = "Software", skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(rename = "DateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "GPS", skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCoordinates>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl MetadataResult {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.software.is_none()
            && self.date_time.is_none()
            && self.gps.is_none()
    }
}

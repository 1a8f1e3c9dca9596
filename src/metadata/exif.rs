use std::{fs::File, io::BufReader, path::Path};

use exif::{Exif, Field, In, Tag, Value};

use crate::{
    error::{ForensicsError, Result},
    metadata::{GpsCoordinates, MetadataResult},
};

const EDITING_SOFTWARE: [&str; 4] = ["photoshop", "paint", "gimp", "lightroom"];

pub struct ExifExtractor;

impl ExifExtractor {
    /// Reads EXIF from any container kamadak-exif understands. A file without
    /// EXIF yields an empty result; unreadable or malformed containers are
    /// reported as [`ForensicsError::Metadata`].
    pub fn extract<P: AsRef<Path>>(path: P) -> Result<MetadataResult> {
        let file = File::open(&path)
            .map_err(|e| ForensicsError::Metadata(format!("{}: {}", path.as_ref().display(), e)))?;
        let mut reader = BufReader::new(file);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Ok(Self::parse_exif(&exif_data)),
            Err(exif::Error::NotFound(_)) => Ok(MetadataResult::default()),
            Err(e) => Err(ForensicsError::Metadata(e.to_string())),
        }
    }

    fn parse_exif(exif: &Exif) -> MetadataResult {
        let tags = exif
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .map(|field| {
                (
                    field.tag.to_string(),
                    field.display_value().with_unit(exif).to_string(),
                )
            })
            .collect();

        let text = |tag| exif.get_field(tag, In::PRIMARY).and_then(ascii_value);

        let software = text(Tag::Software);
        let date_time = text(Tag::DateTime);
        let date_time_original = text(Tag::DateTimeOriginal);
        let date_time_digitized = text(Tag::DateTimeDigitized);

        let mut indicators = Vec::new();
        if let Some(sw) = &software {
            let lower = sw.to_lowercase();
            if EDITING_SOFTWARE.iter().any(|name| lower.contains(name)) {
                indicators.push(format!("Edited with: {}", sw));
            }
        }
        if date_time_original.is_none() && date_time.is_some() {
            indicators.push("Original datetime missing (may be stripped)".into());
        }
        if let (Some(orig), Some(digi)) = (&date_time_original, &date_time_digitized) {
            if orig != digi {
                indicators.push("Inconsistent date time values".into());
            }
        }

        MetadataResult {
            camera_make: text(Tag::Make),
            camera_model: text(Tag::Model),
            software,
            date_time,
            gps: Self::extract_gps(exif),
            indicators,
            tags,
        }
    }

    fn extract_gps(exif: &Exif) -> Option<GpsCoordinates> {
        let coordinate = |value_tag, ref_tag| {
            let dms = rationals(exif.get_field(value_tag, In::PRIMARY)?)?;
            let hemisphere = exif
                .get_field(ref_tag, In::PRIMARY)
                .and_then(ascii_value)
                .and_then(|s| s.chars().next());
            dms_to_degrees(&dms, hemisphere)
        };

        Some(GpsCoordinates {
            latitude: coordinate(Tag::GPSLatitude, Tag::GPSLatitudeRef)?,
            longitude: coordinate(Tag::GPSLongitude, Tag::GPSLongitudeRef)?,
        })
    }
}

fn ascii_value(field: &Field) -> Option<String> {
    match &field.value {
        Value::Ascii(parts) => {
            let text = parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).trim_matches(char::from(0)).trim().to_string())?;
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn rationals(field: &Field) -> Option<Vec<f64>> {
    match &field.value {
        Value::Rational(values) => Some(values.iter().map(|r| r.to_f64()).collect()),
        _ => None,
    }
}

/// Degree/minute/second triple to signed decimal degrees. `S` and `W`
/// hemispheres are negative.
pub fn dms_to_degrees(dms: &[f64], hemisphere: Option<char>) -> Option<f64> {
    let [degrees, minutes, seconds] = dms else {
        return None;
    };

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if !value.is_finite() {
        return None;
    }

    match hemisphere.map(|c| c.to_ascii_uppercase()) {
        Some('S') | Some('W') => Some(-value),
        _ => Some(value),
    }
}

use exif::{In, Reader, Tag, Value};
use shared::{FindingStatus, MetadataFinding};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Software tag fragments left behind by generative tools.
pub const GENERATOR_SIGNATURES: [&str; 4] =
    ["stable diffusion", "midjourney", "dall-e", "adobe firefly"];

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("{0}")]
    Read(#[from] exif::Error),
}

pub fn find_generator_signature(software: &str) -> Option<&'static str> {
    let software = software.to_lowercase();
    GENERATOR_SIGNATURES
        .iter()
        .copied()
        .find(|signature| software.contains(signature))
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => Some(
            parts
                .iter()
                .map(|part| String::from_utf8_lossy(part).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

type ExifFields = (BTreeMap<String, String>, Option<String>);

/// Reads primary-IFD EXIF fields. `Ok(None)` means the container carries no EXIF.
fn read_fields(bytes: &[u8]) -> Result<Option<ExifFields>, MetadataError> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut fields = BTreeMap::new();
    for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
        fields.insert(
            field.tag.to_string(),
            field.display_value().with_unit(&exif).to_string(),
        );
    }
    if fields.is_empty() {
        return Ok(None);
    }

    let software = exif
        .get_field(Tag::Software, In::PRIMARY)
        .and_then(|field| ascii_value(&field.value));
    Ok(Some((fields, software)))
}

pub fn classify_software(
    fields: BTreeMap<String, String>,
    software: Option<&str>,
) -> MetadataFinding {
    let software = software.unwrap_or_default();
    if find_generator_signature(software).is_some() {
        return MetadataFinding {
            status: FindingStatus::Danger,
            message: format!(
                "Generative AI signature found in metadata: {}",
                software.to_lowercase()
            ),
            raw_fields: Some(fields),
        };
    }
    MetadataFinding {
        status: FindingStatus::Success,
        message: "Metadata appears consistent with standard capture.".to_string(),
        raw_fields: Some(fields),
    }
}

pub fn check_metadata(bytes: &[u8]) -> MetadataFinding {
    match read_fields(bytes) {
        Ok(None) => MetadataFinding {
            status: FindingStatus::Warning,
            message: "No EXIF metadata found. \
                      This is common in AI-generated images or social media uploads."
                .to_string(),
            raw_fields: None,
        },
        Ok(Some((fields, software))) => classify_software(fields, software.as_deref()),
        Err(e) => {
            log::warn!("Metadata analysis failed: {}", e);
            MetadataFinding {
                status: FindingStatus::Error,
                message: format!("Metadata analysis failed: {}", e),
                raw_fields: None,
            }
        }
    }
}

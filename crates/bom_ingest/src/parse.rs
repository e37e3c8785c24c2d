use bom_core::{Enrichment, Event};
use ingest_logging::ingest_trace;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Frame, FrameFormatError};

/// Field marker that a frame must start with to carry an event.
pub const DATA_MARKER: &str = "data:";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichmentPayload {
    product_type: Option<String>,
    manufacturer: Option<String>,
}

/// Convert one frame into an event.
///
/// Frames without the data marker and payloads with an unrecognised `status`
/// yield `Ok(None)`. A marked frame with an unusable payload is an error for
/// that frame only.
pub fn parse_frame(frame: &Frame) -> Result<Option<Event>, FrameFormatError> {
    let Some(rest) = frame.as_str().strip_prefix(DATA_MARKER) else {
        return Ok(None);
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest).trim();

    let value: Value = serde_json::from_str(payload)
        .map_err(|err| FrameFormatError::InvalidJson(err.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(FrameFormatError::NotAnObject);
    };
    let status = match fields.get("status") {
        Some(Value::String(status)) => status.clone(),
        _ => return Err(FrameFormatError::MissingField("status")),
    };

    let event = match status.as_str() {
        "initial" => Event::Initial {
            part_numbers: required(&mut fields, "partnumbers", "partNumbers")?,
        },
        "processed" => {
            let part_number = required(&mut fields, "partnumber", "partNumber")?;
            let data: EnrichmentPayload = optional(&mut fields, "data")?.unwrap_or_default();
            Event::Processed {
                part_number,
                enrichment: Enrichment {
                    product_type: data.product_type,
                    manufacturer: data.manufacturer,
                },
            }
        }
        "error" => Event::Error {
            part_number: required(&mut fields, "partnumber", "partNumber")?,
        },
        other => {
            ingest_trace!("ignoring frame with unrecognised status `{}`", other);
            return Ok(None);
        }
    };

    Ok(Some(event))
}

fn required<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    field: &'static str,
    alias: &'static str,
) -> Result<T, FrameFormatError> {
    let value = fields
        .remove(field)
        .or_else(|| fields.remove(alias))
        .ok_or(FrameFormatError::MissingField(field))?;
    decode_field(value, field)
}

fn optional<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<T>, FrameFormatError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode_field(value, field).map(Some),
    }
}

fn decode_field<T: DeserializeOwned>(value: Value, field: &'static str) -> Result<T, FrameFormatError> {
    serde_json::from_value(value).map_err(|err| FrameFormatError::InvalidField {
        field,
        message: err.to_string(),
    })
}

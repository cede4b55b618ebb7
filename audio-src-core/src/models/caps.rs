//! Parsing of caps descriptions into an [`AudioFormat`].
//!
//! Accepts the usual serialized form of a fixed raw audio structure:
//!
//! ```text
//! audio/x-raw, format=(string)F32LE, layout=interleaved, rate=(int)48000, channels=2
//! ```
//!
//! `format` and `layout` are optional but must match what the source
//! produces when present. Unfixed values (lists, ranges) are rejected.

use super::audio_models::{AudioFormat, MAX_CHANNELS};
use super::error::FormatError;

pub const RAW_AUDIO_MEDIA_TYPE: &str = "audio/x-raw";

impl AudioFormat {
    pub fn from_caps(caps: &str) -> Result<Self, FormatError> {
        let mut parts = caps.split(',').map(str::trim);

        let media_type = parts.next().unwrap_or_default();
        if media_type.is_empty() {
            return Err(FormatError::Empty);
        }
        if media_type != RAW_AUDIO_MEDIA_TYPE {
            return Err(FormatError::MediaType(media_type.to_string()));
        }

        let mut rate = None;
        let mut channels = None;

        for part in parts.filter(|p| !p.is_empty()) {
            let (name, raw) = part.split_once('=').ok_or_else(|| FormatError::InvalidValue {
                field: "structure",
                value: part.to_string(),
            })?;
            let value = strip_type(raw.trim());

            match name.trim() {
                "rate" => rate = Some(parse_positive::<u32>("rate", value)?),
                "channels" => channels = Some(parse_positive::<u16>("channels", value)?),
                "format" if value != AudioFormat::SAMPLE_FORMAT => {
                    return Err(FormatError::SampleFormat(value.to_string()));
                }
                "layout" if value != AudioFormat::LAYOUT => {
                    return Err(FormatError::Layout(value.to_string()));
                }
                _ => {}
            }
        }

        let rate = rate.ok_or(FormatError::MissingField("rate"))?;
        let channels = channels.ok_or(FormatError::MissingField("channels"))?;
        if channels > MAX_CHANNELS {
            return Err(FormatError::InvalidValue {
                field: "channels",
                value: channels.to_string(),
            });
        }

        Ok(AudioFormat::new(rate, channels))
    }
}

/// Drops a leading `(type)` annotation, e.g. `(int)48000` -> `48000`.
fn strip_type(value: &str) -> &str {
    match value.strip_prefix('(').and_then(|rest| rest.split_once(')')) {
        Some((_, rest)) => rest.trim(),
        None => value,
    }
}

fn parse_positive<T>(field: &'static str, value: &str) -> Result<T, FormatError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let invalid = || FormatError::InvalidValue {
        field,
        value: value.to_string(),
    };
    let parsed: T = value.parse().map_err(|_| invalid())?;
    if parsed <= T::default() {
        return Err(invalid());
    }
    Ok(parsed)
}

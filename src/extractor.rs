use crate::error::AppError;
use crate::photo::timestamp;
use chrono::{DateTime, Utc};
use exif::{In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;

/// Result of transforming one candidate file. `coordinates` is `None` when
/// the file carries no usable GPS tags; such files never become records.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub coordinates: Option<(f64, f64)>,
    pub captured_at: DateTime<Utc>,
    pub thumbnail: Vec<u8>,
}

/// Pure per-file transform, the unit of parallel work: EXIF tags in the raw
/// bytes are parsed for GPS position and capture time, and the raster is
/// re-encoded as a bounded JPEG thumbnail. Absent or malformed GPS tags are
/// not an error; an undecodable raster is.
pub fn extract(
    bytes: &[u8],
    fallback_modified: DateTime<Utc>,
    max_size: u32,
    quality: u8,
) -> Result<Extraction, AppError> {
    let exif_data = {
        let mut cursor = Cursor::new(bytes);
        exif::Reader::new().read_from_container(&mut cursor).ok()
    };
    if exif_data.is_none() {
        log::debug!("No EXIF data found");
    }

    let coordinates = exif_data.as_ref().and_then(gps_coordinates);
    let captured_at = exif_data
        .as_ref()
        .and_then(capture_datetime)
        .unwrap_or(fallback_modified);

    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    let (target_w, target_h) = fit_within(width, height, max_size);
    let resized = if (target_w, target_h) == (width, height) {
        img
    } else {
        img.resize_exact(target_w, target_h, image::imageops::FilterType::Triangle)
    };
    let rgb = resized.to_rgb8();

    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;

    Ok(Extraction {
        coordinates,
        captured_at,
        thumbnail: buf.into_inner(),
    })
}

/// DMS rationals to signed decimal degrees; `S` and `W` flip the sign.
pub fn convert_dms_to_dd(degrees: f64, minutes: f64, seconds: f64, direction: char) -> f64 {
    let dd = degrees + minutes / 60.0 + seconds / 3600.0;
    if matches!(direction, 'S' | 'W') {
        -dd
    } else {
        dd
    }
}

fn gps_coordinates(exif: &exif::Exif) -> Option<(f64, f64)> {
    let lat_field = exif.get_field(Tag::GPSLatitude, In::PRIMARY)?;
    let lon_field = exif.get_field(Tag::GPSLongitude, In::PRIMARY)?;

    let (lat_d, lat_m, lat_s) = dms_components(&lat_field.value)?;
    let (lon_d, lon_m, lon_s) = dms_components(&lon_field.value)?;

    let lat_ref = hemisphere(exif, Tag::GPSLatitudeRef, 'N');
    let lon_ref = hemisphere(exif, Tag::GPSLongitudeRef, 'E');

    let latitude = convert_dms_to_dd(lat_d, lat_m, lat_s, lat_ref);
    let longitude = convert_dms_to_dd(lon_d, lon_m, lon_s, lon_ref);
    log::trace!("GPS position: {}, {}", latitude, longitude);
    Some((latitude, longitude))
}

/// A coordinate tag must carry three rationals with nonzero denominators;
/// anything else counts as "no GPS data" for the file.
fn dms_components(value: &Value) -> Option<(f64, f64, f64)> {
    if let Value::Rational(rationals) = value {
        if rationals.len() >= 3 && rationals.iter().take(3).all(|r| r.denom != 0) {
            return Some((
                rationals[0].to_f64(),
                rationals[1].to_f64(),
                rationals[2].to_f64(),
            ));
        }
    }
    None
}

fn hemisphere(exif: &exif::Exif, tag: Tag, default: char) -> char {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|field| match &field.value {
            Value::Ascii(lines) => lines
                .first()
                .and_then(|line| line.first())
                .map(|b| (*b as char).to_ascii_uppercase()),
            _ => None,
        })
        .unwrap_or(default)
}

fn capture_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    let raw = match &field.value {
        Value::Ascii(lines) => std::str::from_utf8(lines.first()?).ok()?,
        _ => return None,
    };
    let parsed = timestamp::parse_flexible(raw);
    if parsed.is_none() {
        log::debug!("Unparseable DateTimeOriginal: {:?}", raw);
    }
    parsed
}

/// Target dimensions for a raster scaled to fit within `max_size` on the
/// longer side, preserving aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width >= height {
        if width > max_size {
            let scaled = (height as f64 * (max_size as f64 / width as f64))
                .round()
                .max(1.0) as u32;
            return (max_size, scaled);
        }
    } else if height > max_size {
        let scaled = (width as f64 * (max_size as f64 / height as f64))
            .round()
            .max(1.0) as u32;
        return (scaled, max_size);
    }
    (width, height)
}

use image::ImageOutputFormat;
use std::io::Cursor;
use std::path::Path;

/// GPS + capture-time tags for a synthetic test JPEG. DMS components are
/// (numerator, denominator) rationals, as they appear on the wire.
pub struct GpsTags<'a> {
    pub lat_dms: [(u32, u32); 3],
    pub lat_ref: char,
    pub lon_dms: [(u32, u32); 3],
    pub lon_ref: char,
    pub datetime: &'a str,
}

pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Jpeg(85)).unwrap();
    buf.into_inner()
}

pub fn write_plain_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode_jpeg(width, height)).unwrap();
}

/// A JPEG whose EXIF APP1 segment carries the given GPS and DateTimeOriginal
/// tags, suitable for driving the extraction pipeline end to end.
pub fn write_jpeg_with_gps(path: &Path, width: u32, height: u32, tags: &GpsTags) {
    let jpeg = encode_jpeg(width, height);
    let tiff = build_tiff(tags);

    let mut app1 = vec![0xFF, 0xE1];
    let segment_len = (2 + 6 + tiff.len()) as u16;
    app1.extend_from_slice(&segment_len.to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    // APP1 goes right after SOI, like a camera writes it
    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, out).unwrap();
}

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

fn ifd_len(entries: u32) -> u32 {
    2 + entries * 12 + 4
}

fn entry(buf: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&kind.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value);
}

fn inline_ascii(c: char) -> [u8; 4] {
    [c as u8, 0, 0, 0]
}

/// Minimal little-endian TIFF: IFD0 pointing at an Exif IFD
/// (DateTimeOriginal) and a GPS IFD (refs + DMS rationals). Offsets are
/// computed up front and checked as the buffer is assembled.
fn build_tiff(tags: &GpsTags) -> Vec<u8> {
    let mut datetime_bytes = tags.datetime.as_bytes().to_vec();
    datetime_bytes.push(0);

    let ifd0_offset: u32 = 8;
    let exif_ifd_offset = ifd0_offset + ifd_len(2);
    let gps_ifd_offset = exif_ifd_offset + ifd_len(1);
    let datetime_offset = gps_ifd_offset + ifd_len(4);
    let lat_offset = datetime_offset + datetime_bytes.len() as u32;
    let lon_offset = lat_offset + 24;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&ifd0_offset.to_le_bytes());

    tiff.extend_from_slice(&2u16.to_le_bytes());
    entry(&mut tiff, 0x8769, TYPE_LONG, 1, exif_ifd_offset.to_le_bytes());
    entry(&mut tiff, 0x8825, TYPE_LONG, 1, gps_ifd_offset.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(tiff.len() as u32, exif_ifd_offset);

    tiff.extend_from_slice(&1u16.to_le_bytes());
    entry(
        &mut tiff,
        0x9003,
        TYPE_ASCII,
        datetime_bytes.len() as u32,
        datetime_offset.to_le_bytes(),
    );
    tiff.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(tiff.len() as u32, gps_ifd_offset);

    tiff.extend_from_slice(&4u16.to_le_bytes());
    entry(&mut tiff, 0x0001, TYPE_ASCII, 2, inline_ascii(tags.lat_ref));
    entry(&mut tiff, 0x0002, TYPE_RATIONAL, 3, lat_offset.to_le_bytes());
    entry(&mut tiff, 0x0003, TYPE_ASCII, 2, inline_ascii(tags.lon_ref));
    entry(&mut tiff, 0x0004, TYPE_RATIONAL, 3, lon_offset.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(tiff.len() as u32, datetime_offset);

    tiff.extend_from_slice(&datetime_bytes);
    for (num, denom) in tags.lat_dms {
        tiff.extend_from_slice(&num.to_le_bytes());
        tiff.extend_from_slice(&denom.to_le_bytes());
    }
    for (num, denom) in tags.lon_dms {
        tiff.extend_from_slice(&num.to_le_bytes());
        tiff.extend_from_slice(&denom.to_le_bytes());
    }
    assert_eq!(tiff.len() as u32, lon_offset + 24);

    tiff
}

pub fn degrees(d: u32) -> [(u32, u32); 3] {
    [(d, 1), (0, 1), (0, 1)]
}

pub fn degrees_minutes(d: u32, m: u32) -> [(u32, u32); 3] {
    [(d, 1), (m, 1), (0, 1)]
}

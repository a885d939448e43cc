//! Intake: turns user-supplied bytes, files or `data:` URIs into a decoded,
//! upright [`Photo`].

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use image::{ImageError, RgbaImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::processing::layout::Size;

/// A decoded photo ready to be mounted into the frame.
#[derive(Debug, Clone)]
pub struct Photo {
    pub image: Arc<RgbaImage>,
    pub label: String,
}

impl Photo {
    pub fn new(image: RgbaImage, label: impl Into<String>) -> Self {
        Self {
            image: Arc::new(image),
            label: label.into(),
        }
    }

    pub fn natural_size(&self) -> Size {
        let (w, h) = self.image.dimensions();
        Size::new(w as f32, h as f32)
    }
}

/// Sniffs, decodes and orients an in-memory image.
pub fn decode_photo(bytes: &[u8], label: impl Into<String>) -> Result<Photo> {
    let label = label.into();
    let format = image::guess_format(bytes).map_err(|_| Error::NotAnImage)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|err| match err {
        ImageError::Unsupported(_) => Error::NotAnImage,
        other => Error::Decode(other),
    })?;

    let mut img = img.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::NotAnImage);
    }

    let orientation = read_orientation(bytes).unwrap_or(1);
    if orientation != 1 {
        debug!(orientation, label = %label, "applying exif orientation");
    }
    img = apply_orientation(img, orientation);

    let (width, height) = img.dimensions();
    debug!(width, height, label = %label, "photo decoded");
    Ok(Photo::new(img, label))
}

/// Accepts `data:image/...;base64,` URIs.
pub fn decode_data_uri(uri: &str) -> Result<Photo> {
    let rest = uri.strip_prefix("data:").ok_or(Error::NotAnImage)?;
    let (header, payload) = rest.split_once(',').ok_or(Error::NotAnImage)?;
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(Error::NotAnImage);
    };
    if !mime.starts_with("image/") {
        return Err(Error::NotAnImage);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| Error::NotAnImage)?;
    decode_photo(&bytes, mime)
}

/// Reads and decodes a file off the async runtime.
pub async fn load_photo(path: PathBuf) -> Result<Photo> {
    tokio::task::spawn_blocking(move || load_photo_blocking(&path))
        .await
        .map_err(|err| Error::Io(std::io::Error::other(err)))?
}

pub fn load_photo_blocking(path: &Path) -> Result<Photo> {
    let bytes = std::fs::read(path)?;
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    decode_photo(&bytes, label)
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|o| o as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let photo = decode_photo(&bytes, "orient6.jpg").unwrap();
        assert_eq!(photo.image.dimensions(), (1, 2));
    }

    #[test]
    fn data_uri_round_trips_through_decoder() {
        let uri = format!("data:image/jpeg;base64,{ORIENT6_JPEG}");
        let photo = decode_data_uri(&uri).unwrap();
        assert_eq!(photo.natural_size(), Size::new(1.0, 2.0));
        assert_eq!(photo.label, "image/jpeg");
    }

    #[test]
    fn text_payload_is_not_an_image() {
        let err = decode_photo(b"hello, this is a note", "note.txt").unwrap_err();
        assert!(matches!(err, Error::NotAnImage));

        let err = decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, Error::NotAnImage));
    }
}

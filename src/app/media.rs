use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::infra::storage::MediaStorage;

const DATA_URI_PREFIX: &str = "data:image";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("The submitted data was not a file. Check the encoding type on the form.")]
    NotAFile,
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,
}

/// Image bytes decoded from a `data:image/<subtype>;base64,` URI.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Storage key, addressed by content so identical uploads share a file.
    pub fn key(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        format!("posts/{}.{}", hex::encode(digest), self.extension)
    }
}

/// Decodes the URI payload and sniffs its format from the magic bytes. The
/// pixel data is left to [`verify_image`].
pub fn decode_data_uri(value: &str) -> Result<DecodedImage, ImageRejection> {
    if !value.starts_with(DATA_URI_PREFIX) {
        return Err(ImageRejection::NotAFile);
    }

    let (header, payload) = value
        .split_once(BASE64_MARKER)
        .ok_or(ImageRejection::InvalidImage)?;
    let subtype = header
        .strip_prefix("data:image/")
        .ok_or(ImageRejection::InvalidImage)?;
    if subtype.is_empty() || !subtype.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ImageRejection::InvalidImage);
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImageRejection::InvalidImage)?;
    image::guess_format(&bytes).map_err(|_| ImageRejection::InvalidImage)?;

    Ok(DecodedImage {
        extension: subtype.to_ascii_lowercase(),
        bytes,
    })
}

/// Fully decodes the image on the blocking pool and hands it back if the
/// pixel data is sound.
pub async fn verify_image(image: DecodedImage) -> Result<DecodedImage, ImageRejection> {
    let verified = tokio::task::spawn_blocking(move || {
        let format = image::guess_format(&image.bytes).ok()?;
        image::load_from_memory_with_format(&image.bytes, format).ok()?;
        Some(image)
    })
    .await;

    match verified {
        Ok(Some(image)) => Ok(image),
        Ok(None) => Err(ImageRejection::InvalidImage),
        Err(err) => {
            tracing::warn!(error = ?err, "image decode did not finish");
            Err(ImageRejection::InvalidImage)
        }
    }
}

#[derive(Clone)]
pub struct MediaService {
    storage: MediaStorage,
}

impl MediaService {
    pub fn new(storage: MediaStorage) -> Self {
        Self { storage }
    }

    /// Writes the image unless an identical one is already stored and
    /// returns its key.
    pub async fn store(&self, image: &DecodedImage) -> Result<String> {
        let key = image.key();
        if !self.storage.exists(&key).await? {
            self.storage.put(&key, &image.bytes).await?;
            tracing::info!(key = %key, bytes = image.bytes.len(), "stored image");
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_data_uri() -> String {
        let mut bytes = Vec::new();
        image::RgbImage::new(2, 2)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
    }

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri(&png_data_uri()).unwrap();
        assert_eq!(image.extension, "png");
        assert!(image.key().starts_with("posts/"));
        assert!(image.key().ends_with(".png"));
    }

    #[test]
    fn plain_strings_are_not_files() {
        assert_eq!(
            decode_data_uri("https://example.com/cat.png").unwrap_err(),
            ImageRejection::NotAFile
        );
    }

    #[test]
    fn corrupt_payloads_are_invalid_images() {
        assert_eq!(
            decode_data_uri("data:image/png;base64,@@@").unwrap_err(),
            ImageRejection::InvalidImage
        );
        let not_an_image = format!("data:image/png;base64,{}", STANDARD.encode(b"hello"));
        assert_eq!(
            decode_data_uri(&not_an_image).unwrap_err(),
            ImageRejection::InvalidImage
        );
        assert_eq!(
            decode_data_uri("data:image/png,plain").unwrap_err(),
            ImageRejection::InvalidImage
        );
    }

    #[tokio::test]
    async fn verify_accepts_whole_images() {
        let image = decode_data_uri(&png_data_uri()).unwrap();
        let key = image.key();
        let verified = verify_image(image).await.unwrap();
        assert_eq!(verified.key(), key);
    }

    #[tokio::test]
    async fn truncated_images_fail_verification() {
        let mut bytes = Vec::new();
        image::RgbImage::new(8, 8)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes.truncate(bytes.len() / 2);
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));

        let image = decode_data_uri(&uri).unwrap();
        assert_eq!(verify_image(image).await.unwrap_err(), ImageRejection::InvalidImage);
    }

    #[test]
    fn identical_images_share_a_key() {
        let first = decode_data_uri(&png_data_uri()).unwrap();
        let second = decode_data_uri(&png_data_uri()).unwrap();
        assert_eq!(first.key(), second.key());
    }
}

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use base64::Engine;
use reqwest::multipart::Part;

use crate::error::{GenerationError, Result};

/// A user-selected image, either on disk or already in memory.
#[derive(Debug, Clone)]
pub enum ImageFile {
    Path(PathBuf),
    Memory { name: String, bytes: Vec<u8> },
}

impl ImageFile {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageFile::Path(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageFile::Memory {
            name: name.into(),
            bytes,
        }
    }

    /// File name used for MIME inference and multipart uploads.
    pub fn name(&self) -> String {
        match self {
            ImageFile::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string()),
            ImageFile::Memory { name, .. } => name.clone(),
        }
    }
}

/// Wire representation a backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// `data:<mime>;base64,...` string for JSON bodies.
    DataUri,
    /// Raw bytes for a multipart form field.
    Multipart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    DataUri(String),
    Multipart(Vec<u8>),
}

/// An image encoded for transport. Either representation can be produced
/// from the other on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub file_name: String,
    pub mime_type: String,
    pub payload: ImagePayload,
}

impl EncodedImage {
    /// The image as a base64 data URI.
    pub fn data_uri(&self) -> Cow<'_, str> {
        match &self.payload {
            ImagePayload::DataUri(uri) => Cow::Borrowed(uri),
            ImagePayload::Multipart(bytes) => Cow::Owned(to_data_uri(&self.mime_type, bytes)),
        }
    }

    /// The raw image bytes.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>> {
        match &self.payload {
            ImagePayload::Multipart(bytes) => Ok(Cow::Borrowed(bytes)),
            ImagePayload::DataUri(uri) => {
                let (_, data) = uri.split_once(";base64,").ok_or_else(|| {
                    GenerationError::Encoding(format!("{}: not a base64 data URI", self.file_name))
                })?;
                base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map(Cow::Owned)
                    .map_err(|e| GenerationError::Encoding(format!("{}: {}", self.file_name, e)))
            }
        }
    }

    /// A multipart form part carrying the image bytes, file name and MIME type.
    pub fn multipart_part(&self) -> Result<Part> {
        let bytes = self.bytes()?.into_owned();
        Part::bytes(bytes)
            .file_name(self.file_name.clone())
            .mime_str(&self.mime_type)
            .map_err(|e| GenerationError::Encoding(format!("{}: {}", self.file_name, e)))
    }

    /// Size of the underlying payload in bytes.
    pub fn len(&self) -> usize {
        match &self.payload {
            ImagePayload::DataUri(uri) => uri.len(),
            ImagePayload::Multipart(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read `file` and encode it for transport.
///
/// The bytes are passed through untouched: no resizing, compression or
/// content-type validation. File-type gating belongs to the caller.
///
/// # Errors
///
/// Returns [`GenerationError::Encoding`] if the file cannot be read.
pub async fn encode(file: &ImageFile, encoding: ImageEncoding) -> Result<EncodedImage> {
    let file_name = file.name();
    let bytes = match file {
        ImageFile::Path(path) => read_image(path).await?,
        ImageFile::Memory { bytes, .. } => bytes.clone(),
    };
    Ok(encode_bytes(file_name, bytes, encoding))
}

/// Encode bytes that are already in memory.
pub fn encode_bytes(
    file_name: impl Into<String>,
    bytes: Vec<u8>,
    encoding: ImageEncoding,
) -> EncodedImage {
    let file_name = file_name.into();
    let mime_type = mime_for(&file_name).to_string();
    let payload = match encoding {
        ImageEncoding::DataUri => ImagePayload::DataUri(to_data_uri(&mime_type, &bytes)),
        ImageEncoding::Multipart => ImagePayload::Multipart(bytes),
    };
    EncodedImage {
        file_name,
        mime_type,
        payload,
    }
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| GenerationError::Encoding(format!("{}: {}", path.display(), e)))
}

fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_inference() {
        assert_eq!(mime_for("photo.PNG"), "image/png");
        assert_eq!(mime_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for("photo.jpg"), "image/jpeg");
        assert_eq!(mime_for("scan.tiff"), "application/octet-stream");
        assert_eq!(mime_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_data_uri_encoding() {
        let img = encode_bytes("dot.png", b"hello".to_vec(), ImageEncoding::DataUri);
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_data_uri_bytes_decode() {
        let img = encode_bytes("dot.png", b"hello".to_vec(), ImageEncoding::DataUri);
        assert_eq!(img.bytes().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn test_multipart_keeps_raw_bytes() {
        let img = encode_bytes("dot.webp", vec![1, 2, 3], ImageEncoding::Multipart);
        assert_eq!(img.payload, ImagePayload::Multipart(vec![1, 2, 3]));
        assert_eq!(img.data_uri(), "data:image/webp;base64,AQID");
        assert!(img.multipart_part().is_ok());
    }

    #[test]
    fn test_malformed_data_uri() {
        let img = EncodedImage {
            file_name: "x.png".into(),
            mime_type: "image/png".into(),
            payload: ImagePayload::DataUri("not-a-data-uri".into()),
        };
        assert!(matches!(img.bytes(), Err(GenerationError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let file = ImageFile::path("/definitely/not/here.png");
        let err = encode(&file, ImageEncoding::DataUri).await.unwrap_err();
        assert!(matches!(err, GenerationError::Encoding(_)));
        assert_eq!(err.kind(), "EncodingError");
    }

    #[tokio::test]
    async fn test_encode_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chair.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let img = encode(&ImageFile::path(&path), ImageEncoding::Multipart)
            .await
            .unwrap();
        assert_eq!(img.file_name, "chair.jpg");
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.len(), 3);
    }
}

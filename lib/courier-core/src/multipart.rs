//! Multipart form data parts.
//!
//! Parts are attached to a [`Request`](crate::Request) in order and encoded
//! as `multipart/form-data` during preparation when no other parameters
//! are present.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

/// A single part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    data: Bytes,
    content_type: Option<String>,
    filename: Option<String>,
}

impl Part {
    /// A part with the given field name and data, without content type or filename.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            content_type: None,
            filename: None,
        }
    }

    /// A text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value.into()).with_content_type("text/plain; charset=utf-8")
    }

    /// A file upload; the content type is guessed from the filename extension.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename);
        Self::new(name, data)
            .with_filename(filename)
            .with_content_type(content_type)
    }

    /// Set the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Part data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Filename, if set.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Encoded multipart body with its boundary.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    body: Bytes,
}

impl Multipart {
    /// Encode `parts` with a freshly generated boundary.
    #[must_use]
    pub fn encode(parts: &[Part]) -> Self {
        Self::encode_with_boundary(parts, generate_boundary())
    }

    /// Encode `parts` with the given boundary.
    #[must_use]
    pub fn encode_with_boundary(parts: &[Part], boundary: impl Into<String>) -> Self {
        let boundary = boundary.into();
        let mut buf = BytesMut::new();

        for part in parts {
            buf.put_slice(b"--");
            buf.put_slice(boundary.as_bytes());
            buf.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
            buf.put_slice(part.name.as_bytes());
            buf.put_u8(b'"');
            if let Some(filename) = &part.filename {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(filename.as_bytes());
                buf.put_u8(b'"');
            }
            buf.put_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }
            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        Self {
            boundary,
            body: buf.freeze(),
        }
    }

    /// The boundary separating parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value for this body.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Consume into the encoded body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("----CourierBoundary{nanos:x}")
}

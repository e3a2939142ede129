//! Response shaping for validated downloads.
//!
//! Turns pipeline outcomes into what a transport sends: a status code, the
//! fixed set of download headers, and the body bytes (optionally a range)
//! read from the validated handle.

use std::fmt;
use std::io::SeekFrom;

use download::{DownloadFile, Rejection, RejectionKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Buffer size for checksum reads.
const HASH_BUFFER_SIZE: usize = 8192;

/// Errors that can occur while shaping or streaming a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The requested range starts past the end of the file.
    #[error("invalid offset {offset} for file of size {file_size}")]
    InvalidRange { offset: u64, file_size: u64 },

    /// IO error while streaming.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status code for a rejection kind.
pub fn status_for(kind: RejectionKind) -> u16 {
    kind.status_code()
}

/// Process exit code for a status: 4 for client errors, 5 for server errors.
pub fn exit_code_for(status: u16) -> i32 {
    match status {
        400..=499 => 4,
        500..=599 => 5,
        _ => 0,
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// `attachment` disposition carrying only the plain display name.
pub fn content_disposition(display_name: &str) -> String {
    let mut escaped = String::with_capacity(display_name.len());
    for c in display_name.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("attachment; filename=\"{escaped}\"")
}

/// A single response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: &'static str,
    pub value: String,
}

impl Header {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Status line, headers and, for rejections, the safe message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl ResponseHead {
    /// Head for serving a whole validated file.
    pub fn for_file<H>(file: &DownloadFile<H>) -> Self {
        Self::for_range(file, ByteRange::full(file.size))
    }

    /// Head for serving `range` of a validated file.
    pub fn for_range<H>(file: &DownloadFile<H>, range: ByteRange) -> Self {
        let mut headers = vec![
            Header::new("Content-Type", file.content_type),
            Header::new("Content-Length", range.len.to_string()),
            Header::new("Content-Disposition", content_disposition(&file.display_name)),
            Header::new("X-Content-Type-Options", "nosniff"),
            Header::new("Cache-Control", "no-store, private"),
            Header::new("Accept-Ranges", "bytes"),
        ];

        let status = if range.is_partial(file.size) {
            headers.push(Header::new("Content-Range", range.content_range(file.size)));
            206
        } else {
            200
        };

        Self {
            status,
            headers,
            message: None,
        }
    }

    /// Head for a refused request. Carries nothing but the safe message.
    pub fn for_rejection(rejection: &Rejection) -> Self {
        Self {
            status: status_for(rejection.kind),
            headers: vec![
                Header::new("Content-Type", "text/plain; charset=utf-8"),
                Header::new("X-Content-Type-Options", "nosniff"),
                Header::new("Cache-Control", "no-store, private"),
            ],
            message: Some(rejection.message),
        }
    }

    /// Value of the first header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Display for ResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.status, reason_phrase(self.status))?;
        for header in &self.headers {
            writeln!(f, "{}: {}", header.name, header.value)?;
        }
        if let Some(message) = self.message {
            writeln!(f)?;
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}

/// A byte range validated against a file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    /// The whole file.
    pub fn full(file_size: u64) -> Self {
        Self {
            start: 0,
            len: file_size,
        }
    }

    /// Range starting at `offset`, clamped to the end of the file.
    ///
    /// Without a `length` the range runs to the end of the file.
    pub fn new(offset: u64, length: Option<u64>, file_size: u64) -> Result<Self, TransportError> {
        if offset > file_size {
            return Err(TransportError::InvalidRange { offset, file_size });
        }
        let remaining = file_size - offset;
        Ok(Self {
            start: offset,
            len: length.map_or(remaining, |len| len.min(remaining)),
        })
    }

    pub fn is_partial(&self, file_size: u64) -> bool {
        self.start != 0 || self.len != file_size
    }

    /// `Content-Range` value, e.g. `bytes 0-99/1000`.
    pub fn content_range(&self, file_size: u64) -> String {
        if self.len == 0 {
            format!("bytes */{file_size}")
        } else {
            format!("bytes {}-{}/{}", self.start, self.start + self.len - 1, file_size)
        }
    }
}

/// Copy `range` of `reader` into `writer`. Returns the bytes written.
pub async fn stream_range<R, W>(
    reader: &mut R,
    range: ByteRange,
    writer: &mut W,
) -> Result<u64, TransportError>
where
    R: AsyncRead + AsyncSeek + Unpin,
    W: AsyncWrite + Unpin,
{
    reader.seek(SeekFrom::Start(range.start)).await?;
    let mut limited = (&mut *reader).take(range.len);
    let written = tokio::io::copy(&mut limited, writer).await?;
    writer.flush().await?;
    Ok(written)
}

/// Hex SHA-256 of everything `reader` yields from offset 0.
///
/// The reader is rewound afterwards so the same handle can still be served.
pub async fn sha256_hex<R>(reader: &mut R) -> Result<String, TransportError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    reader.seek(SeekFrom::Start(0)).await?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    reader.seek(SeekFrom::Start(0)).await?;
    Ok(hex::encode(hasher.finalize()))
}

//! Response decompression stage.
//!
//! As a request stage it advertises the supported encodings through
//! `Accept-Encoding`; as a response stage it decompresses bodies encoded with
//! gzip, deflate, br (brotli) or zstd according to `Content-Encoding`.
//! Register the same value in both chains. Bodies with an encoding it cannot
//! undo are left untouched, headers included.

use std::io::Read;

use bytes::Bytes;
use tracing::trace;

use crate::{Request, RequestStage, Response, ResponseStage, StageError};

const ACCEPT_ENCODING: &str = "gzip, deflate, br, zstd";

/// Stage that negotiates and undoes content encoding.
///
/// # Example
///
/// ```ignore
/// use courier::{Manager, stage::DecompressionStage};
///
/// let manager = Manager::builder()
///     .request_stage(DecompressionStage::new())
///     .response_stage(DecompressionStage::new())
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompressionStage {
    _private: (),
}

impl DecompressionStage {
    /// Create a new decompression stage.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

/// Decompress bytes based on encoding.
///
/// Returns `None` for encodings this stage cannot undo, including stacked
/// ones such as `gzip, br`.
fn decompress(encoding: &str, body: &[u8]) -> Result<Option<Bytes>, StageError> {
    let mut decompressed = Vec::new();
    match encoding {
        "gzip" | "x-gzip" => {
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut decompressed)
                .map_err(|e| StageError::with_source("gzip decompression failed", e))?;
        }
        "deflate" => {
            flate2::read::DeflateDecoder::new(body)
                .read_to_end(&mut decompressed)
                .map_err(|e| StageError::with_source("deflate decompression failed", e))?;
        }
        "br" => {
            brotli::BrotliDecompress(&mut &*body, &mut decompressed)
                .map_err(|e| StageError::with_source("brotli decompression failed", e))?;
        }
        "zstd" => {
            decompressed = zstd::decode_all(body)
                .map_err(|e| StageError::with_source("zstd decompression failed", e))?;
        }
        _ => return Ok(None),
    }

    Ok(Some(Bytes::from(decompressed)))
}

impl RequestStage for DecompressionStage {
    fn name(&self) -> &str {
        "decompression"
    }

    fn transform(&self, mut request: Request) -> Result<Request, StageError> {
        if request.header("accept-encoding").is_none() {
            request.set_header("Accept-Encoding", ACCEPT_ENCODING);
        }
        Ok(request)
    }
}

impl ResponseStage for DecompressionStage {
    fn name(&self) -> &str {
        "decompression"
    }

    fn transform_response(
        &self,
        mut response: Response,
        _request: &Request,
    ) -> Result<Response, StageError> {
        let encoding = response
            .header("content-encoding")
            .map(|encoding| encoding.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if encoding.is_empty() || encoding == "identity" {
            return Ok(response);
        }

        let Some(decompressed) = decompress(&encoding, response.body())? else {
            trace!(%encoding, "unsupported content encoding, body left as is");
            return Ok(response);
        };

        let headers = response.headers_mut();
        headers.retain(|name, _| {
            !name.eq_ignore_ascii_case("content-encoding")
                && !name.eq_ignore_ascii_case("content-length")
        });
        headers.insert("content-length".to_string(), decompressed.len().to_string());
        response.set_body(decompressed);

        Ok(response)
    }
}

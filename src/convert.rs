use bytes::Bytes;

use crate::error::Error;
use crate::transport::RawResponse;
use crate::Result;

/// Selects how a success-status body is interpreted.
///
/// `Blob` and `ArrayBuffer` are aliases of `Bytes` kept for parity with
/// fetch-style clients; all three yield [`Converted::Bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertType {
    Json,
    Text,
    Blob,
    Bytes,
    ArrayBuffer,
    FormData,
    /// Identity conversion: the raw response is passed through untouched.
    Response,
}

/// A converted success body.
#[derive(Debug, Clone)]
pub enum Converted {
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
    Form(Vec<(String, String)>),
    Response(RawResponse),
}

impl Converted {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_form(self) -> Option<Vec<(String, String)>> {
        match self {
            Self::Form(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<RawResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}

/// Converts a raw response body to the requested type. Failures are
/// terminal: a malformed body would come back identical on a retry.
pub(crate) fn convert(response: RawResponse, tag: ConvertType) -> Result<Converted> {
    match tag {
        ConvertType::Response => Ok(Converted::Response(response)),
        ConvertType::Blob | ConvertType::Bytes | ConvertType::ArrayBuffer => {
            Ok(Converted::Bytes(response.body))
        }
        ConvertType::Text => match String::from_utf8(response.body.to_vec()) {
            Ok(text) => Ok(Converted::Text(text)),
            Err(err) => Err(Error::Conversion {
                tag,
                message: err.to_string(),
            }),
        },
        ConvertType::Json => match serde_json::from_slice(&response.body) {
            Ok(value) => Ok(Converted::Json(value)),
            Err(err) => Err(Error::Conversion {
                tag,
                message: err.to_string(),
            }),
        },
        ConvertType::FormData => {
            let pairs = url::form_urlencoded::parse(&response.body)
                .into_owned()
                .collect();
            Ok(Converted::Form(pairs))
        }
    }
}

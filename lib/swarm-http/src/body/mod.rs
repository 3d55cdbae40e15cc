/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::StatusCode;

use crate::HttpProtocolError;
use crate::header::Header;

mod chunked_decoder;
pub use chunked_decoder::ChunkedDecodeReader;

mod chunked_encoder;
pub use chunked_encoder::ChunkedEncodeWriter;

mod content_length;
pub use content_length::ContentLengthReader;

mod reader;
pub use reader::HttpBodyReader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpBodyType {
    ContentLength(u64),
    Chunked,
    ReadUntilEnd,
}

impl HttpBodyType {
    fn detect(header: &Header) -> Result<Option<Self>, HttpProtocolError> {
        let codings = header
            .get_multiple(http::header::TRANSFER_ENCODING.as_str())
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("identity"))
            .collect::<Vec<_>>();
        match codings.as_slice() {
            [] => {}
            [c] if c.eq_ignore_ascii_case("chunked") => return Ok(Some(HttpBodyType::Chunked)),
            [first, ..] => {
                let bad = codings
                    .iter()
                    .find(|c| !c.eq_ignore_ascii_case("chunked"))
                    .unwrap_or(first);
                return Err(HttpProtocolError::UnsupportedTransferCoding(
                    bad.to_ascii_lowercase(),
                ));
            }
        }

        if let Some(v) = header.get(http::header::CONTENT_LENGTH.as_str()) {
            let len = v
                .trim()
                .parse::<u64>()
                .map_err(|_| HttpProtocolError::InvalidContentLength)?;
            return Ok(Some(HttpBodyType::ContentLength(len)));
        }

        Ok(None)
    }

    /// Body framing of a request, None if it has no body.
    pub fn detect_request(header: &Header) -> Result<Option<Self>, HttpProtocolError> {
        match Self::detect(header)? {
            Some(HttpBodyType::ContentLength(0)) => Ok(None),
            r => Ok(r),
        }
    }

    /// Body framing of a response, None if it has no body.
    pub fn detect_response(
        header: &Header,
        method_is_head: bool,
        status: StatusCode,
    ) -> Result<Option<Self>, HttpProtocolError> {
        if method_is_head
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            return Ok(None);
        }
        match Self::detect(header)? {
            Some(HttpBodyType::ContentLength(0)) => Ok(None),
            Some(t) => Ok(Some(t)),
            None => Ok(Some(HttpBodyType::ReadUntilEnd)),
        }
    }
}

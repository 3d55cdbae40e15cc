/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::HttpLineParseError;

#[derive(Debug, Error)]
pub enum HttpProtocolError {
    #[error("malformed chunk: {0}")]
    MalformedChunk(&'static str),
    #[error("missing CRLF after chunk data")]
    MissingChunkCrlf,
    #[error("invalid chunk size line: {0}")]
    InvalidChunkSizeLine(HttpLineParseError),
    #[error("chunk size line too long (> {0})")]
    ChunkLineTooLong(usize),
    #[error("unexpected eof while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("corrupt header continuation line")]
    CorruptContinuation,
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(HttpLineParseError),
    #[error("too large header, should be less than {0}")]
    TooLargeHeader(usize),
    #[error("invalid request line: {0}")]
    InvalidRequestLine(HttpLineParseError),
    #[error("invalid status line: {0}")]
    InvalidStatusLine(HttpLineParseError),
    #[error("unsupported transfer coding: {0}")]
    UnsupportedTransferCoding(String),
    #[error("invalid content length")]
    InvalidContentLength,
    #[error("missing host header")]
    MissingHostHeader,
}

impl HttpProtocolError {
    /// The status code to send back to the peer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpProtocolError::TooLargeHeader(_) => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            HttpProtocolError::UnsupportedTransferCoding(_) => StatusCode::NOT_IMPLEMENTED,
            HttpProtocolError::InvalidRequestLine(HttpLineParseError::MissingMethod) => {
                StatusCode::NOT_IMPLEMENTED
            }
            HttpProtocolError::InvalidRequestLine(HttpLineParseError::UnsupportedVersion(_)) => {
                StatusCode::HTTP_VERSION_NOT_SUPPORTED
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub(crate) fn into_io_error(self) -> io::Error {
        let kind = match &self {
            HttpProtocolError::UnexpectedEof(_) => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, self)
    }

    /// Get the protocol error carried inside an io error returned by the body readers.
    pub fn from_io_error(e: &io::Error) -> Option<&HttpProtocolError> {
        e.get_ref()
            .and_then(|inner| inner.downcast_ref::<HttpProtocolError>())
    }
}

#[derive(Debug, Error)]
pub enum HttpHeadReadError {
    #[error("closed by peer")]
    Closed,
    #[error("io failed: {0:?}")]
    IoFailed(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] HttpProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code() {
        assert_eq!(
            HttpProtocolError::TooLargeHeader(1024).status_code(),
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        );
        assert_eq!(
            HttpProtocolError::UnsupportedTransferCoding("gzip".to_string()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            HttpProtocolError::CorruptContinuation.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn io_error_wrap() {
        let e = HttpProtocolError::MalformedChunk("missing crlf").into_io_error();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(
            HttpProtocolError::from_io_error(&e),
            Some(HttpProtocolError::MalformedChunk(_))
        ));

        let e = HttpProtocolError::UnexpectedEof("chunk data").into_io_error();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }
}

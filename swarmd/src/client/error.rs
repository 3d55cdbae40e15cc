/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use swarm_http::{HttpHeadReadError, HttpProtocolError};
use swarm_io_ext::SizeLimitExceeded;

use crate::pool::PoolError;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("resolve failed: {0:?}")]
    ResolveFailed(io::Error),
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
    #[error("connect timeout")]
    ConnectTimeout,
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("read timeout")]
    ReadTimeout,
    #[error("closed by remote")]
    ClosedByRemote,
    #[error("invalid response: {0}")]
    InvalidResponse(HttpProtocolError),
    #[error("body too large: {0}")]
    BodyTooLarge(SizeLimitExceeded),
    #[error("unsupported url {0}")]
    UnsupportedUrl(String),
}

impl From<PoolError> for HttpClientError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::ResolveFailed(e) => HttpClientError::ResolveFailed(e),
            PoolError::ConnectFailed(e) => HttpClientError::ConnectFailed(e),
            PoolError::ConnectTimeout => HttpClientError::ConnectTimeout,
            PoolError::Closed => HttpClientError::ConnectFailed(io::Error::other("pool closed")),
        }
    }
}

impl From<HttpHeadReadError> for HttpClientError {
    fn from(e: HttpHeadReadError) -> Self {
        match e {
            HttpHeadReadError::Closed => HttpClientError::ClosedByRemote,
            HttpHeadReadError::IoFailed(e) => HttpClientError::ReadFailed(e),
            HttpHeadReadError::Protocol(e) => HttpClientError::InvalidResponse(e),
        }
    }
}

impl HttpClientError {
    /// Map an io error returned while reading a body.
    pub(crate) fn from_body_read(e: io::Error) -> Self {
        if let Some(limit) = SizeLimitExceeded::from_io_error(&e) {
            return HttpClientError::BodyTooLarge(*limit);
        }
        match HttpProtocolError::from_io_error(&e) {
            Some(HttpProtocolError::UnexpectedEof(_)) => HttpClientError::ClosedByRemote,
            Some(_) => {
                let kind = e.kind();
                match e.into_inner().map(|inner| inner.downcast::<HttpProtocolError>()) {
                    Some(Ok(p)) => HttpClientError::InvalidResponse(*p),
                    _ => HttpClientError::ReadFailed(io::Error::from(kind)),
                }
            }
            None => HttpClientError::ReadFailed(e),
        }
    }
}

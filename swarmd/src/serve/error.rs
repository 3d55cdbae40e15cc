/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use http::StatusCode;
use thiserror::Error;

use swarm_http::HttpProtocolError;

use crate::client::HttpClientError;

#[derive(Error, Debug)]
pub enum ServerTaskForbiddenError {
    #[error("proxy disabled")]
    ProxyDisabled,
    #[error("method unavailable")]
    MethodUnavailable,
    #[error("target port denied")]
    PortDenied,
    #[error("proxy time limit exceeded")]
    TimeLimitExceeded,
    #[error("invalid peer key")]
    PeerKeyMismatch,
    #[error("request rate limited")]
    RateLimited,
}

impl ServerTaskForbiddenError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerTaskForbiddenError::MethodUnavailable => StatusCode::METHOD_NOT_ALLOWED,
            ServerTaskForbiddenError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerTaskError {
    #[error("internal server error: {0}")]
    InternalServerError(&'static str),
    #[error("forbidden by rule: {0}")]
    ForbiddenByRule(#[from] ServerTaskForbiddenError),
    #[error("invalid client protocol: {0}")]
    InvalidClientProtocol(#[from] HttpProtocolError),
    #[error("unimplemented method {0}")]
    UnimplementedMethod(String),
    #[error("tcp read from client: {0:?}")]
    ClientTcpReadFailed(io::Error),
    #[error("tcp write to client: {0:?}")]
    ClientTcpWriteFailed(io::Error),
    #[error("client authentication failed")]
    ClientAuthFailed,
    #[error("proxy authentication required")]
    ProxyAuthRequired,
    #[error("client body larger than {0} bytes")]
    ClientBodyTooLarge(u64),
    #[error("client app timeout: {0}")]
    ClientAppTimeout(&'static str),
    #[error("upstream not resolved: {0:?}")]
    UpstreamNotResolved(io::Error),
    #[error("upstream not connected: {0:?}")]
    UpstreamNotConnected(io::Error),
    #[error("invalid upstream protocol: {0}")]
    InvalidUpstreamProtocol(HttpProtocolError),
    #[error("read from upstream: {0:?}")]
    UpstreamReadFailed(io::Error),
    #[error("write to upstream: {0:?}")]
    UpstreamWriteFailed(io::Error),
    #[error("upstream app timeout: {0}")]
    UpstreamAppTimeout(&'static str),
    #[error("closed by upstream")]
    ClosedByUpstream,
    #[error("closed by client")]
    ClosedByClient,
    #[error("finished")]
    Finished, // this isn't an error, for log only
    #[error("unclassified error: {0:?}")]
    UnclassifiedError(#[from] anyhow::Error),
}

impl ServerTaskError {
    pub fn brief(&self) -> &'static str {
        match self {
            ServerTaskError::InternalServerError(_) => "InternalServerError",
            ServerTaskError::ForbiddenByRule(_) => "ForbiddenByRule",
            ServerTaskError::InvalidClientProtocol(_) => "InvalidClientProtocol",
            ServerTaskError::UnimplementedMethod(_) => "UnimplementedMethod",
            ServerTaskError::ClientTcpReadFailed(_) => "ClientTcpReadFailed",
            ServerTaskError::ClientTcpWriteFailed(_) => "ClientTcpWriteFailed",
            ServerTaskError::ClientAuthFailed => "ClientAuthFailed",
            ServerTaskError::ProxyAuthRequired => "ProxyAuthRequired",
            ServerTaskError::ClientBodyTooLarge(_) => "ClientBodyTooLarge",
            ServerTaskError::ClientAppTimeout(_) => "ClientAppTimeout",
            ServerTaskError::UpstreamNotResolved(_) => "UpstreamNotResolved",
            ServerTaskError::UpstreamNotConnected(_) => "UpstreamNotConnected",
            ServerTaskError::InvalidUpstreamProtocol(_) => "InvalidUpstreamProtocol",
            ServerTaskError::UpstreamReadFailed(_) => "UpstreamReadFailed",
            ServerTaskError::UpstreamWriteFailed(_) => "UpstreamWriteFailed",
            ServerTaskError::UpstreamAppTimeout(_) => "UpstreamAppTimeout",
            ServerTaskError::ClosedByUpstream => "ClosedByUpstream",
            ServerTaskError::ClosedByClient => "ClosedByClient",
            ServerTaskError::Finished => "Finished",
            ServerTaskError::UnclassifiedError(_) => "UnclassifiedError",
        }
    }

    /// Reset, broken pipe or peer close, which ends the session silently.
    pub fn is_client_disconnected(&self) -> bool {
        match self {
            ServerTaskError::ClosedByClient => true,
            ServerTaskError::ClientTcpReadFailed(e) | ServerTaskError::ClientTcpWriteFailed(e) => {
                is_disconnect_error(e)
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ServerTaskError::ClientAppTimeout(_) | ServerTaskError::UpstreamAppTimeout(_)
        )
    }

    /// The status code of the error reply, if one should be sent.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ServerTaskError::InternalServerError(_) | ServerTaskError::UnclassifiedError(_) => {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ServerTaskError::ForbiddenByRule(e) => Some(e.status_code()),
            ServerTaskError::InvalidClientProtocol(e) => Some(e.status_code()),
            ServerTaskError::UnimplementedMethod(_) => Some(StatusCode::NOT_IMPLEMENTED),
            ServerTaskError::ClientAuthFailed => Some(StatusCode::UNAUTHORIZED),
            ServerTaskError::ProxyAuthRequired => Some(StatusCode::PROXY_AUTHENTICATION_REQUIRED),
            ServerTaskError::ClientBodyTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ServerTaskError::ClientAppTimeout(_) => Some(StatusCode::REQUEST_TIMEOUT),
            ServerTaskError::UpstreamNotResolved(_)
            | ServerTaskError::UpstreamNotConnected(_)
            | ServerTaskError::InvalidUpstreamProtocol(_)
            | ServerTaskError::UpstreamReadFailed(_)
            | ServerTaskError::UpstreamWriteFailed(_)
            | ServerTaskError::ClosedByUpstream => Some(StatusCode::BAD_GATEWAY),
            ServerTaskError::UpstreamAppTimeout(_) => Some(StatusCode::GATEWAY_TIMEOUT),
            ServerTaskError::ClientTcpReadFailed(_)
            | ServerTaskError::ClientTcpWriteFailed(_)
            | ServerTaskError::ClosedByClient
            | ServerTaskError::Finished => None,
        }
    }
}

impl ServerTaskError {
    /// Map an io error returned by a client body reader.
    pub(crate) fn from_client_body_read(e: io::Error) -> Self {
        match take_protocol_error(e) {
            Ok(HttpProtocolError::UnexpectedEof(_)) => ServerTaskError::ClosedByClient,
            Ok(p) => ServerTaskError::InvalidClientProtocol(p),
            Err(e) => ServerTaskError::ClientTcpReadFailed(e),
        }
    }

    /// Map an io error returned by an upstream body reader.
    pub(crate) fn from_upstream_body_read(e: io::Error) -> Self {
        match take_protocol_error(e) {
            Ok(HttpProtocolError::UnexpectedEof(_)) => ServerTaskError::ClosedByUpstream,
            Ok(p) => ServerTaskError::InvalidUpstreamProtocol(p),
            Err(e) => ServerTaskError::UpstreamReadFailed(e),
        }
    }
}

fn take_protocol_error(e: io::Error) -> Result<HttpProtocolError, io::Error> {
    if HttpProtocolError::from_io_error(&e).is_none() {
        return Err(e);
    }
    let kind = e.kind();
    match e.into_inner().map(|inner| inner.downcast::<HttpProtocolError>()) {
        Some(Ok(p)) => Ok(*p),
        _ => Err(io::Error::from(kind)),
    }
}

pub type ServerTaskResult<T> = Result<T, ServerTaskError>;

pub(crate) fn is_disconnect_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

impl From<HttpClientError> for ServerTaskError {
    fn from(e: HttpClientError) -> Self {
        match e {
            HttpClientError::ResolveFailed(e) => ServerTaskError::UpstreamNotResolved(e),
            HttpClientError::ConnectFailed(e) => ServerTaskError::UpstreamNotConnected(e),
            HttpClientError::ConnectTimeout => {
                ServerTaskError::UpstreamAppTimeout("connect to upstream")
            }
            HttpClientError::WriteFailed(e) => ServerTaskError::UpstreamWriteFailed(e),
            HttpClientError::ReadFailed(e) => ServerTaskError::UpstreamReadFailed(e),
            HttpClientError::ReadTimeout => {
                ServerTaskError::UpstreamAppTimeout("read response from upstream")
            }
            HttpClientError::ClosedByRemote => ServerTaskError::ClosedByUpstream,
            HttpClientError::InvalidResponse(e) => ServerTaskError::InvalidUpstreamProtocol(e),
            HttpClientError::BodyTooLarge(_) => {
                ServerTaskError::InternalServerError("upstream body too large")
            }
            HttpClientError::UnsupportedUrl(_) => {
                ServerTaskError::InternalServerError("unsupported upstream url")
            }
        }
    }
}

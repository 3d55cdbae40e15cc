/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod auth;
mod error;
mod parse;
mod version;

pub mod body;
pub mod date;
pub mod header;

pub use auth::{AuthParseError, HttpBasicAuth, proxy_authenticate_basic};
pub use error::{HttpHeadReadError, HttpProtocolError};
pub use parse::{
    HeaderBlockParser, HttpChunkedLine, HttpHeaderLine, HttpLineParseError, HttpRequestLine,
    HttpStatusLine, read_header_block,
};
pub use version::HttpVersion;

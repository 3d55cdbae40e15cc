/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::{ServerTaskError, ServerTaskForbiddenError, ServerTaskResult};

pub(crate) mod notes;

mod registry;
pub use registry::{ConnectionGuard, ConnectionInfo, ConnectionRegistry};

mod origin;
pub use origin::{NotFoundHandler, OriginHandler, OriginRequest, OriginResponse};

mod request;
pub use request::{HttpRequest, TargetForm};

mod persistence;
pub use persistence::decide_keep_alive;

mod response;

mod connection;
pub use connection::{ConnectionState, HttpSession};

mod connect;
mod forward;

mod server;
pub use server::HttpServer;

/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::time::Duration;

use arcstr::ArcStr;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

/// Per request task info, shared by the handlers and the task log.
pub(crate) struct ServerTaskNotes {
    pub(crate) id: Uuid,
    pub(crate) start_at: DateTime<Utc>,
    create_ins: Instant,
    pub(crate) client_addr: SocketAddr,
    pub(crate) server_addr: SocketAddr,
    pub(crate) user: Option<ArcStr>,
}

impl ServerTaskNotes {
    pub(crate) fn new(client_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        ServerTaskNotes {
            id: Uuid::new_v4(),
            start_at: Utc::now(),
            create_ins: Instant::now(),
            client_addr,
            server_addr,
            user: None,
        }
    }

    #[inline]
    pub(crate) fn time_elapsed(&self) -> Duration {
        self.create_ins.elapsed()
    }

    pub(crate) fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.as_str())
    }
}

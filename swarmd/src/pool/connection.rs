/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::OwnedSemaphorePermit;

use crate::upstream::UpstreamAddr;

/// A connection borrowed from the pool, the active permit is returned on drop.
pub struct PooledConnection {
    upstream: UpstreamAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    reused: bool,
    reusable: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub(super) fn new(
        upstream: UpstreamAddr,
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
        reused: bool,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        PooledConnection {
            upstream,
            reader,
            writer,
            reused,
            reusable: false,
            _permit: permit,
        }
    }

    #[inline]
    pub fn upstream(&self) -> &UpstreamAddr {
        &self.upstream
    }

    /// Whether this connection has been taken from the idle set.
    #[inline]
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Mark the connection as reusable after a complete response.
    #[inline]
    pub fn set_reusable(&mut self, reusable: bool) {
        self.reusable = reusable;
    }

    #[inline]
    pub fn reader(&mut self) -> &mut BufReader<OwnedReadHalf> {
        &mut self.reader
    }

    #[inline]
    pub fn writer(&mut self) -> &mut OwnedWriteHalf {
        &mut self.writer
    }

    pub(super) fn into_reusable(self) -> Option<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        if self.reusable && self.reader.buffer().is_empty() {
            Some((self.reader, self.writer))
        } else {
            None
        }
    }
}

/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::Method;
use slog::{Drain, Logger, slog_info, slog_o};

use swarm_http::HttpVersion;
use swarm_slog_types::{LtDateTime, LtDuration, LtHttpMethod, LtHttpUri, LtHttpVersion, LtUuid};
use swarm_stdlog::AsyncLogConfig;

use crate::config::{LogConfig, TaskLogTarget};
use crate::serve::ServerTaskError;
use crate::serve::notes::ServerTaskNotes;

const TASK_LOG_THREAD_NAME: &str = "log-task";

pub(crate) fn build_logger(config: &LogConfig, server_name: &str) -> anyhow::Result<Option<Logger>> {
    let use_stdout = match config.task {
        TaskLogTarget::Stdout => true,
        TaskLogTarget::Stderr => false,
        TaskLogTarget::Discard => return Ok(None),
    };
    let mut async_conf = AsyncLogConfig::with_name(TASK_LOG_THREAD_NAME);
    async_conf.channel_capacity = config.channel_capacity;
    let drain = swarm_stdlog::new_async_logger(&async_conf, false, use_stdout)?;
    let common_values = slog_o!(
        "log_type" => super::LOG_TYPE_TASK,
        "pid" => std::process::id(),
        "server_name" => server_name.to_string(),
    );
    Ok(Some(Logger::root(drain.fuse(), common_values)))
}

pub(crate) enum TaskEvent {
    Finished,
}

impl TaskEvent {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::Finished => "Finished",
        }
    }
}

pub(crate) struct TaskLogForHttp<'a> {
    pub(crate) logger: &'a Logger,
    pub(crate) task_notes: &'a ServerTaskNotes,
    pub(crate) method: &'a Method,
    pub(crate) uri: &'a str,
    pub(crate) uri_max_chars: usize,
    pub(crate) version: HttpVersion,
    pub(crate) user_agent: Option<&'a str>,
    pub(crate) upstream: Option<String>,
    pub(crate) status: Option<u16>,
    pub(crate) cache: Option<&'static str>,
    pub(crate) keep_alive: bool,
    pub(crate) client_rd_bytes: u64,
    pub(crate) client_wr_bytes: u64,
}

impl TaskLogForHttp<'_> {
    pub(crate) fn log(&self, task_type: &'static str, e: &ServerTaskError) {
        slog_info!(self.logger, "{}", e;
            "task_type" => task_type,
            "task_id" => LtUuid(&self.task_notes.id),
            "task_event" => TaskEvent::Finished.as_str(),
            "start_at" => LtDateTime(&self.task_notes.start_at),
            "user" => self.task_notes.user_name(),
            "server_addr" => self.task_notes.server_addr,
            "client_addr" => self.task_notes.client_addr,
            "upstream" => self.upstream.as_deref(),
            "method" => LtHttpMethod(self.method),
            "uri" => LtHttpUri::new(self.uri, self.uri_max_chars),
            "version" => LtHttpVersion(self.version.as_str()),
            "user_agent" => self.user_agent,
            "rsp_status" => self.status,
            "cache" => self.cache,
            "keep_alive" => self.keep_alive,
            "c_rd_bytes" => self.client_rd_bytes,
            "c_wr_bytes" => self.client_wr_bytes,
            "total_time" => LtDuration(self.task_notes.time_elapsed()),
            "reason" => e.brief(),
        )
    }
}

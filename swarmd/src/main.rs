/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use log::{debug, error, info};

use swarmd::config::SwarmConfig;
use swarmd::context::ServerContext;
use swarmd::serve::HttpServer;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) = swarmd::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let _log_guard = swarmd::log::process::setup(&proc_args).context("failed to setup logger")?;

    let config = swarmd::config::load(&proc_args)
        .context(format!("failed to load config, opts: {:?}", &proc_args))?;
    debug!("loaded config from {}", proc_args.config_file.display());

    if proc_args.test_config {
        info!("the format of the config file is ok");
        return Ok(());
    }

    match tokio_run(config) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn tokio_run(config: SwarmConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("swarm-worker")
        .build()
        .context("failed to start runtime")?;
    rt.block_on(async {
        let ctx = Arc::new(ServerContext::new(&config).context("failed to build server context")?);

        let pool_check = Arc::clone(ctx.pool()).spawn_idle_check();
        let stat = swarmd::stat::spawn(Arc::clone(&ctx), config.stat.clone());

        let server = HttpServer::bind(Arc::clone(&ctx)).await?;
        server
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("failed to wait for ctrl-c: {e}");
                }
            })
            .await;

        stat.abort();
        pool_check.abort();
        info!("{} sessions still open at exit", ctx.registry().len());
        Ok(())
    })
}

//! Periodic background jobs: the idle-channel sweep and the translation
//! token refresh.

use crate::config::Config;
use crate::constants::{SWEEP_SCHEDULE, TOKEN_REFRESH_SCHEDULE};
use crate::reaper::IdleReaper;
use crate::translator::TokenProvider;
use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Initialize and start the scheduled jobs.
///
/// The token provider is refreshed once up front so the first relayed
/// message doesn't race an empty token, then kept fresh on its schedule.
pub async fn start_jobs(
    config: Arc<Config>,
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    reaper: Arc<IdleReaper>,
) -> Result<JobScheduler> {
    if let Err(err) = tokens.refresh(&http, &config).await {
        error!("Initial token refresh failed: {err:#}");
    }

    let scheduler = JobScheduler::new().await?;

    let sweep_reaper = Arc::clone(&reaper);
    let sweep = Job::new_async(SWEEP_SCHEDULE, move |_uuid, _lock| {
        let reaper = Arc::clone(&sweep_reaper);
        Box::pin(async move {
            if let Err(err) = reaper.sweep().await {
                error!("Idle channel sweep failed: {err:#}");
            }
        })
    })?;
    scheduler.add(sweep).await?;

    let refresh_tokens = Arc::clone(&tokens);
    let refresh = Job::new_async(TOKEN_REFRESH_SCHEDULE, move |_uuid, _lock| {
        let tokens = Arc::clone(&refresh_tokens);
        let http = http.clone();
        let config = Arc::clone(&config);
        Box::pin(async move {
            if let Err(err) = tokens.refresh(&http, &config).await {
                error!("Scheduled token refresh failed: {err:#}");
            }
        })
    })?;
    scheduler.add(refresh).await?;

    scheduler.start().await?;
    info!("Scheduled jobs started");

    Ok(scheduler)
}

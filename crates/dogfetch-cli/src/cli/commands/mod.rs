use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dogfetch::{
    run_cancellable, AppLifecycleEvent, ConnectivityMonitor, ConnectivityMonitoring, DogService,
    FetchError, ServiceConfig, TcpProbe,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::args::*;
use crate::exit_codes;

pub mod breeds;
pub mod download;

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let mut config = ServiceConfig::from_env().context("reading DOGFETCH_* environment")?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.clone());
    }

    // Kept alive for the whole command; dropping it stops the probe.
    let monitor = if cli.no_probe {
        None
    } else {
        let probe = Arc::new(TcpProbe::new(cli.probe.clone(), PROBE_INTERVAL));
        let monitor = ConnectivityMonitor::new(
            probe,
            futures::stream::pending::<AppLifecycleEvent>(),
            config.no_connection_delay(),
        )
        .context("starting reachability probe")?;
        Some(Arc::new(monitor))
    };

    let connectivity = monitor
        .clone()
        .map(|m| m as Arc<dyn ConnectivityMonitoring>);
    let service = match DogService::from_config(&config, connectivity) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    debug!(base_url = %service.base_url(), "dispatching");

    let token = CancellationToken::new();
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(token.clone()));

    let code = match cli.cmd {
        Command::Breeds => run_command(&token, breeds::list_breeds(&service)).await,
        Command::Images(args) => run_command(&token, breeds::list_images(&service, args)).await,
        Command::Random(args) => run_command(&token, breeds::random_image(&service, args)).await,
        Command::Download(args) => {
            run_command(&token, download::download(&service, args)).await
        }
    };

    ctrl_c.abort();
    Ok(code)
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupted, cancelling");
        token.cancel();
    }
}

/// Run a command under `token` and turn its result into an exit code.
async fn run_command<F>(token: &CancellationToken, command: F) -> i32
where
    F: Future<Output = Result<i32, FetchError>>,
{
    match run_cancellable(token, command).await {
        None => exit_codes::INTERRUPTED,
        Some(Ok(code)) => code,
        Some(Err(e)) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

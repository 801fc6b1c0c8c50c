//! Daemon startup and shutdown.
//!
//! [`run`] creates the fifo, waits for the subscriber, starts one listener per
//! keyboard plus the publisher and returns once every listener has finished.
//! No task it spawned is left running when it returns.
//! Failures before the first task is spawned are returned as errors; after
//! that, each task only ever stops itself.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::FapsResult;
use crate::fifo;
use crate::keyboard::DeviceEnumerator;
use crate::ledger::ActivityLedger;
use crate::listener::{self, ListenerContext, ListenerStatus};
use crate::publisher::Publisher;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

/// Why the daemon stopped.
#[derive(Debug)]
pub enum Shutdown {
    /// Every listener finished; holds each device with its final status.
    ListenersClosed(Vec<(PathBuf, ListenerStatus)>),
    /// There were no devices and the publisher stopped.
    PublisherStopped(FapsResult<()>),
    /// A write raised `SIGPIPE`: the subscriber closed its end.
    SubscriberGone,
}

/// Run the daemon until it has no more work.
///
/// The fifo at `config.fifo_path` exists only for the duration of this call.
pub async fn run(
    clock: Clock,
    config: &Config,
    enumerator: &dyn DeviceEnumerator,
) -> FapsResult<Shutdown> {
    let guard = fifo::create(&config.fifo_path)?;
    tracing::info!("Waiting for a client on {}...", guard.path().display());

    let channel = Arc::new(fifo::connect(guard.path(), config.connect).await?);
    tracing::info!("Client connected to {}.", guard.path().display());

    let mut sigpipe = signal(SignalKind::pipe())?;

    let devices = enumerator.enumerate()?;
    if devices.is_empty() {
        tracing::warn!("No keyboard devices found; publishing APM only.");
    }

    let ledger = Arc::new(ActivityLedger::new());
    let ctx = ListenerContext {
        clock,
        ledger: Arc::clone(&ledger),
        channel: Arc::clone(&channel),
    };

    let mut listeners = devices
        .into_iter()
        .map(|device| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let status = listener::listen(device.clone(), ctx).await;
                (device, status)
            })
        })
        .collect::<FuturesUnordered<_>>();

    let mut publisher = tokio::spawn(
        Publisher {
            clock,
            ledger,
            channel,
            interval: config.publish_interval,
            window: config.apm_window,
        }
        .run(),
    );

    let shutdown = if listeners.is_empty() {
        tokio::select! {
            res = &mut publisher => Shutdown::PublisherStopped(res.unwrap_or_else(|e| Err(e.into()))),
            _ = sigpipe.recv() => Shutdown::SubscriberGone,
        }
    } else {
        tokio::select! {
            statuses = join_listeners(&mut listeners) => Shutdown::ListenersClosed(statuses),
            _ = sigpipe.recv() => Shutdown::SubscriberGone,
        }
    };

    // The publisher holds nothing that needs a graceful release.
    publisher.abort();

    // Listeners still running hold their device open; wait until each one
    // has been dropped so that nothing outlives the fifo.
    for listener in listeners.iter() {
        listener.abort();
    }
    while listeners.next().await.is_some() {}

    match &shutdown {
        Shutdown::ListenersClosed(_) => tracing::info!("All listeners closed. Exiting..."),
        Shutdown::PublisherStopped(_) => tracing::info!("APM monitor stopped. Exiting..."),
        Shutdown::SubscriberGone => tracing::info!("Client closed the fifo. Exiting..."),
    }

    Ok(shutdown)
}

async fn join_listeners(
    listeners: &mut FuturesUnordered<JoinHandle<(PathBuf, ListenerStatus)>>,
) -> Vec<(PathBuf, ListenerStatus)> {
    let mut statuses = Vec::with_capacity(listeners.len());

    while let Some(joined) = listeners.next().await {
        match joined {
            Ok((device, status)) => {
                tracing::info!(
                    "{}: Listener closed with status {} ({status}).",
                    device.display(),
                    status.code()
                );
                statuses.push((device, status));
            }
            Err(e) => tracing::error!("listener task failed: {e}"),
        }
    }

    statuses
}

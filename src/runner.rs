//! Process wiring
//!
//! Builds every component, configures the dispatch mode, serves updates until
//! a shutdown signal arrives, and always tears the mode down on the way out.

use crate::bot::dispatcher::Dispatcher as UpdateDispatcher;
use crate::bot::transport::{TelegramTransport, Transport};
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::mode::{DispatchMode, ModeSelector};
use crate::resolver::UrlResolver;
use crate::signal::shutdown_signal;
use crate::storage::R2Storage;
use crate::webhook::{self, AppState};
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Webhook updates buffered between the HTTP handler and the dispatcher
pub const UPDATE_QUEUE_CAPACITY: usize = 1024;

/// Run the bot until shutdown.
///
/// # Errors
///
/// Returns an error if the dispatch mode cannot be configured or the HTTP
/// listener cannot be bound. Teardown has already run when this returns.
pub async fn run_bot(settings: Settings) -> anyhow::Result<()> {
    let bot = Bot::new(settings.telegram_token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let catalog = Arc::new(Catalog::builtin());
    info!("Catalog loaded with {} videos.", catalog.len());

    let store = Arc::new(R2Storage::new(&settings.storage).await);
    let resolver = Arc::new(UrlResolver::new(store));
    if settings.storage.bucket.is_none() {
        warn!("R2_BUCKET_NAME is not set, every video will be reported as unavailable");
    }

    let engine = Arc::new(UpdateDispatcher::new(
        transport.clone(),
        Arc::clone(&catalog),
        resolver,
        settings.storage.bucket.clone(),
        settings.delivery.clone(),
    ));

    let selector = ModeSelector::new(transport.clone());
    let mode = selector
        .select_and_configure(&settings.webhook)
        .await
        .context("Failed to configure dispatch mode")?;

    if let Err(e) = transport.set_commands().await {
        warn!("Failed to publish bot commands: {e}");
    }

    let shutdown = selector.shutdown_token();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                () = shutdown_signal() => shutdown.cancel(),
                () = shutdown.cancelled() => {}
            }
        }
    });

    let serving = serve_updates(mode, settings, bot, catalog, engine, shutdown);
    let result = serve_then_teardown(&selector, serving).await;
    info!("Bot stopped.");
    result
}

/// Run `serving` on its own task and tear the mode down however it ends,
/// including a panic.
async fn serve_then_teardown<F>(selector: &ModeSelector, serving: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let result = match tokio::spawn(serving).await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("Update serving task crashed: {e}")),
    };
    selector.teardown().await;
    result
}

async fn serve_updates(
    mode: DispatchMode,
    settings: Settings,
    bot: Bot,
    catalog: Arc<Catalog>,
    engine: Arc<UpdateDispatcher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((settings.http_host.as_str(), settings.http_port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind HTTP listener on {}:{}",
                settings.http_host, settings.http_port
            )
        })?;

    match mode {
        DispatchMode::Webhook => {
            let (tx, rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);
            let pump = tokio::spawn(pump_updates(rx, engine));
            let state = AppState {
                catalog,
                webhook_secret: settings.webhook.secret.as_deref().map(Arc::from),
                updates: Some(tx),
            };

            info!("Bot is running (webhook mode)...");
            let served = webhook::serve(listener, state, shutdown.clone()).await;
            shutdown.cancel();

            // The router owned the sender; the pump finishes in-flight
            // deliveries before teardown runs
            if let Err(e) = pump.await {
                warn!("Update pump stopped abnormally: {e}");
            }
            served.context("HTTP server failed")
        }
        DispatchMode::Polling => {
            let state = AppState {
                catalog,
                webhook_secret: None,
                updates: None,
            };
            let server = async {
                let served = webhook::serve(listener, state, shutdown.clone()).await;
                shutdown.cancel();
                served
            };

            info!("Bot is running (polling mode)...");
            let (served, ()) = tokio::join!(server, run_polling(bot, engine, shutdown.clone()));
            served.context("HTTP server failed")
        }
    }
}

async fn pump_updates(mut rx: mpsc::Receiver<Update>, engine: Arc<UpdateDispatcher>) {
    let tracker = TaskTracker::new();
    while let Some(update) = rx.recv().await {
        tracker.spawn(Arc::clone(&engine).dispatch(update));
    }
    tracker.close();
    debug!(in_flight = tracker.len(), "Update queue closed, draining");
    tracker.wait().await;
}

fn polling_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().endpoint(|update: Update, engine: Arc<UpdateDispatcher>| async move {
        engine.dispatch(update).await;
        respond(())
    })
}

async fn run_polling(bot: Bot, engine: Arc<UpdateDispatcher>, shutdown: CancellationToken) {
    let listener = Polling::builder(bot.clone())
        .drop_pending_updates()
        .build();

    let mut dispatcher = Dispatcher::builder(bot, polling_handler())
        .dependencies(dptree::deps![engine])
        .build();

    let finished = CancellationToken::new();
    let token = dispatcher.shutdown_token();
    tokio::spawn({
        let shutdown = shutdown.clone();
        let finished = finished.clone();
        async move {
            shutdown.cancelled().await;
            // Shutdown is refused while the dispatcher is still starting up
            while !finished.is_cancelled() {
                match token.shutdown() {
                    Ok(stopped) => {
                        stopped.await;
                        break;
                    }
                    Err(e) => {
                        debug!("Polling dispatcher not running yet: {e}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    });

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    finished.cancel();
    shutdown.cancel();
}

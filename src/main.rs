//! FormBuddy Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use FormBuddy::{
    config::{SessionBackend, Settings},
    database::{create_pool, run_migrations, DatabaseConfig, MemorySink, PersistenceSink, RegisteredUserRepository},
    handlers::{self, Command},
    state::{
        DialogueDriver, DriverOptions, FormRegistry, MemorySessionStore, RedisSessionStore,
        SessionJanitor, SessionStore, REGISTRATION_FORM,
    },
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", FormBuddy::info());

    // Session storage
    let store: Arc<dyn SessionStore> = match settings.session.backend {
        SessionBackend::Memory => {
            info!("Using in-memory session storage");
            Arc::new(MemorySessionStore::new())
        }
        SessionBackend::Redis => {
            info!("Connecting to Redis...");
            let redis_store = RedisSessionStore::new(&settings.session).await?;
            redis_store.test_connection().await?;
            Arc::new(redis_store)
        }
    };

    let mut janitor = SessionJanitor::new(
        store.clone(),
        Duration::from_secs(settings.session.cleanup_interval_seconds),
    );
    janitor.start();

    // Persistence sink
    let sink: Arc<dyn PersistenceSink> = match &settings.database {
        Some(database) => {
            info!("Connecting to database...");
            let pool = create_pool(&DatabaseConfig::from(database)).await?;
            run_migrations(&pool).await?;
            Arc::new(RegisteredUserRepository::new(pool))
        }
        None => {
            warn!("No database configured, registrations will be kept in memory only");
            Arc::new(MemorySink::new())
        }
    };

    let registry = FormRegistry::new()?;
    let form = registry.get_form(REGISTRATION_FORM)?.clone();
    let driver = Arc::new(DialogueDriver::new(form, store, sink, DriverOptions::from(&settings)));

    let bot = Bot::new(&settings.bot.token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let mut dispatcher = Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![driver])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd);
        })
        .enable_ctrlc_handler()
        .build();

    info!("Starting bot with polling mode...");
    dispatcher.dispatch().await;

    janitor.stop();
    info!("FormBuddy bot has been shut down.");

    Ok(())
}

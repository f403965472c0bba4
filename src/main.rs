use chrono::Utc;
use clap::Parser;
use newsbot::bot::BotHandler;
use newsbot::config::{AppConfig, DEFAULT_DATABASE_URL};
use newsbot::errors::AppResult;
use newsbot::feed::HttpFetcher;
use newsbot::telegram::{dispatcher, TelegramMessenger};
use newsbot::{db, observability, tasks};
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database path, overrides DATABASE_URL
    #[clap(long)]
    database: Option<String>,

    /// Run a single ingestion cycle and exit
    #[clap(long)]
    once: bool,

    /// Apply pending migrations and exit
    #[clap(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    observability::init_logging();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "Fatal error, shutting down");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AppResult<()> {
    if args.migrate {
        let database_url = args
            .database
            .or_else(|| env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let pool = db::initialize_db_pool(&database_url)?;
        return db::run_migrations(&pool);
    }

    let mut config = AppConfig::from_env()?;
    if let Some(database) = args.database {
        log::info!("Using database path from --database: {}", database);
        config.database_url = database;
    }
    let config = Arc::new(config);

    let pool = db::initialize_db_pool(&config.database_url)?;
    db::run_migrations(&pool)?;

    let bot = Bot::new(config.bot_token.clone());
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);

    if args.once {
        let report =
            tasks::feed_monitor::run_cycle(&pool, fetcher.as_ref(), messenger.as_ref(), &config, Utc::now())
                .await?;
        tracing::info!(inserted = report.inserted, "Single ingestion cycle done");
        return Ok(());
    }

    // fails fast on a bad token
    let me = bot.get_me().await?;
    tracing::info!(
        username = me.user.username.as_deref().unwrap_or_default(),
        timezone = %config.timezone,
        delivery = ?config.delivery_mode,
        admins = config.admin_ids.len(),
        "Bot authenticated"
    );

    let (stop, shutdown) = tasks::shutdown_channel();
    let workers = vec![
        tokio::spawn(tasks::feed_monitor::start(
            pool.clone(),
            fetcher,
            messenger.clone(),
            config.clone(),
            shutdown.clone(),
        )),
        tokio::spawn(tasks::autopost::start(
            pool.clone(),
            messenger.clone(),
            config.clone(),
            shutdown.clone(),
        )),
        tokio::spawn(tasks::retention::start(pool.clone(), config.clone(), shutdown)),
    ];

    let handler = Arc::new(BotHandler::new(pool, messenger, config));
    dispatcher::run(bot, handler).await;

    let _ = stop.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            log::warn!("Background task ended abnormally: {e}");
        }
    }
    Ok(())
}

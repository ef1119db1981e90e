use std::{path::PathBuf, process, sync::Arc};

use clap::Parser;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use bfbot_core::{config::Config, logging, store};
use bfbot_telegram::ingest::{self, AppState};

/// Look up user ids across community membership databases from Telegram.
#[derive(Parser, Debug)]
#[command(name = "bfbot")]
struct Args {
    /// Quiet, set log level to WARNING
    #[arg(short)]
    quiet: bool,

    /// Location of config file
    #[arg(short, value_name = "file", default_value = "./config.yaml")]
    config: PathBuf,
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    logging::init(args.quiet);

    let cfg = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let stores = match store::detect_stores(&cfg.database_path) {
        Ok(stores) => stores,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let bot = Bot::new(cfg.bot_token.clone());
    match bot.get_me().await {
        Ok(me) => info!("logged in as @{}", me.username()),
        Err(e) => warn!("could not fetch bot identity: {e}"),
    }
    info!("Startup OK");

    let state = Arc::new(AppState { cfg, stores });

    tokio::select! {
        res = ingest::run_polling(bot, state) => {
            if let Err(e) = res {
                error!("polling loop failed: {e:#}");
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, exiting");
            process::exit(1);
        }
    }
}

//! Long-poll ingestion: receive updates, match the lookup command, reply.

use std::{sync::Arc, time::Duration};

use regex::Regex;
use teloxide::{
    prelude::*,
    types::{AllowedUpdate, ParseMode, Update, UpdateKind},
};
use tokio::time::sleep;
use tracing::{error, warn};

use bfbot_core::{config::Config, domain::UserId, lookup::lookup, store::StoreMap};

use crate::{deliver, DeliveryOutcome};

/// Long-poll receive timeout, in seconds.
const POLL_TIMEOUT_SECS: u32 = 60;
/// Pause before polling again after a failed receive.
const RECOVER_PAUSE: Duration = Duration::from_secs(1);

/// Everything the loop needs, built once at startup.
pub struct AppState {
    pub cfg: Config,
    pub stores: StoreMap,
}

/// Receive updates forever.
///
/// A failed receive logs a warning and pauses briefly; an error inside one
/// event's handler is logged and the next event is processed. Neither stops
/// the loop.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    let mut offset: i32 = 0;
    loop {
        let batch = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message])
            .await;

        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.id + 1);
                    if let Err(e) = handle_update(&bot, &state, update).await {
                        error!("error in event handler: {e:#}");
                    }
                }
            }
            Err(e) => {
                warn!("{e} while polling Telegram, retrying");
                sleep(RECOVER_PAUSE).await;
            }
        }
    }
}

async fn handle_update(bot: &Bot, state: &AppState, update: Update) -> anyhow::Result<()> {
    let UpdateKind::Message(msg) = update.kind else {
        return Ok(());
    };
    if !(msg.chat.is_group() || msg.chat.is_supergroup()) {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    // Informational only: the command is still processed below.
    if let Some(target) = state.cfg.target_group {
        if msg.chat.id.0 != target {
            warn!(
                "got message from group {} which we're not supposed to be in",
                msg.chat.id.0
            );
        }
    }

    let Some(id) = parse_command(text) else {
        return Ok(());
    };

    let report = lookup(&state.stores, id)?;
    let reply_chat = ChatId(state.cfg.target_group.unwrap_or(msg.chat.id.0));

    let outcome = deliver(|| {
        bot.send_message(reply_chat, report.clone())
            .parse_mode(ParseMode::Html)
    })
    .await;
    if outcome != DeliveryOutcome::Sent {
        warn!("lookup reply for {id} not delivered: {outcome:?}");
    }

    Ok(())
}

/// Extract the user id from a lookup command: `/bf` plus a 3-or-more-digit
/// id, with an optional `@botname` mention after the id.
fn parse_command(text: &str) -> Option<UserId> {
    let re = Regex::new(r"^/bf\s*([0-9]{3,})(@|\s|$)").expect("valid regex");
    let caps = re.captures(text)?;
    caps[1].parse::<i64>().ok().map(UserId)
}

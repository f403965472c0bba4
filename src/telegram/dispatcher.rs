use crate::bot::{BotHandler, CallbackContext};
use crate::telegram::TelegramMessenger;
use std::sync::Arc;
use teloxide::prelude::*;

pub type SharedHandler = Arc<BotHandler<TelegramMessenger>>;

/// Long-polls Telegram and feeds every text message and button press to the
/// handler. Returns after Ctrl-C.
pub async fn run(bot: Bot, handler: SharedHandler) {
    let tree = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    tracing::info!("Dispatcher started");
    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![handler])
        .default_handler(|update| async move {
            log::debug!("Unhandled update: {:?}", update.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Dispatcher stopped");
}

async fn on_message(msg: Message, handler: SharedHandler) -> ResponseResult<()> {
    match msg.text() {
        Some(text) => handler.handle_text(msg.chat.id.0, text).await,
        None => log::debug!("Ignoring non-text message in chat {}", msg.chat.id),
    }
    Ok(())
}

async fn on_callback(query: CallbackQuery, handler: SharedHandler) -> ResponseResult<()> {
    // presses on inline-mode messages carry no chat to answer in
    let (Some(data), Some(message)) = (query.data.clone(), query.message.as_ref()) else {
        log::debug!("Ignoring callback {} without data or message", query.id);
        return Ok(());
    };
    handler
        .handle_callback(CallbackContext {
            callback_id: query.id.clone(),
            chat_id: message.chat.id.0,
            message_id: message.id.0,
            data,
        })
        .await;
    Ok(())
}

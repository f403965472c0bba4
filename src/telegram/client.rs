use super::types::{Keyboard, Outgoing};
use crate::errors::{AppError, AppResult};
use std::future::Future;
use teloxide::payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};

/// Outbound side of the chat transport.
pub trait Messenger: Send + Sync {
    /// Sends a new message and returns its id.
    fn send(&self, chat_id: i64, message: Outgoing) -> impl Future<Output = AppResult<i32>> + Send;

    /// Replaces text and keyboard of a message the bot sent earlier.
    fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        message: Outgoing,
    ) -> impl Future<Output = AppResult<()>> + Send;

    /// Acknowledges a button press, optionally with a short toast.
    fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> impl Future<Output = AppResult<()>> + Send;
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn to_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.into_iter().map(|row| {
        row.into_iter()
            .map(|b| InlineKeyboardButton::callback(b.text, b.data))
            .collect::<Vec<_>>()
    }))
}

impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, message: Outgoing) -> AppResult<i32> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), message.text)
            .disable_web_page_preview(true);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(keyboard) = message.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        let sent = request.await?;
        log::debug!("Sent message {} to chat {}", sent.id.0, chat_id);
        Ok(sent.id.0)
    }

    async fn edit(&self, chat_id: i64, message_id: i32, message: Outgoing) -> AppResult<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), message.text)
            .disable_web_page_preview(true);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(keyboard) = message.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        match request.await {
            Ok(_) => Ok(()),
            // pressing the button of the page already shown
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()> {
        let mut request = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(text) = text {
            request = request.text(text.to_string());
        }
        request.await?;
        Ok(())
    }
}

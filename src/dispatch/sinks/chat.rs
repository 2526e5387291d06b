use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::audit::Severity;
use crate::dispatch::notification::{Delivery, Notification};

use super::{Sink, SinkError, SinkKind};

const TELEGRAM_TEXT_SAFE_LIMIT: usize = 3900;
const TITLE_LIMIT: usize = 512;
const MARKUP_CHARS: usize = "<b></b>\n<pre></pre>".len();

/// Posts notifications to a Telegram chat.
pub struct ChatChannelSink {
    bot: Bot,
    chat_id: ChatId,
    min_severity: Severity,
}

impl ChatChannelSink {
    pub fn new(bot_token: &str, chat_id: ChatId, min_severity: Severity) -> Self {
        Self {
            bot: Bot::new(bot_token),
            chat_id,
            min_severity,
        }
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "ℹ️",
        Severity::Warning => "⚠️",
        Severity::Error => "❗",
        Severity::Critical => "🚨",
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Cuts already escaped HTML without leaving half an entity behind.
fn truncate_escaped(escaped: &str, limit: usize) -> &str {
    let cut = truncate_chars(escaped, limit);
    if cut.len() == escaped.len() {
        return cut;
    }
    match cut.rfind('&') {
        Some(amp) if !cut[amp..].contains(';') => &cut[..amp],
        _ => cut,
    }
}

/// HTML body for a chat notification, escaped and kept under the message limit.
pub fn format_chat_message(notification: &Notification) -> String {
    let entry = notification.entry();
    let title = format!(
        "{} {}",
        severity_marker(entry.severity),
        notification.headline()
    );

    let mut details = format!(
        "action: {}\nseverity: {}\nat: {}",
        entry.action,
        entry.severity,
        entry.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(subject) = &entry.subject {
        details.push_str(&format!("\nsubject: {}", subject));
    }
    if let Notification::Alert { event, .. } = notification {
        details.push_str(&format!(
            "\nfirst breach: {}",
            event.first_breach_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    let title = html_escape::encode_text(&title);
    let title = truncate_escaped(&title, TITLE_LIMIT);
    let body_budget = TELEGRAM_TEXT_SAFE_LIMIT
        .saturating_sub(title.chars().count())
        .saturating_sub(MARKUP_CHARS);
    let body = html_escape::encode_text(&details);
    let body = truncate_escaped(&body, body_budget);
    format!("<b>{}</b>\n<pre>{}</pre>", title, body)
}

#[async_trait]
impl Sink for ChatChannelSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Chat
    }

    fn name(&self) -> &str {
        "chat_channel"
    }

    fn accepts(&self, notification: &Notification) -> bool {
        notification.delivery() == Delivery::All && notification.severity() >= self.min_severity
    }

    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        self.bot
            .send_message(self.chat_id, format_chat_message(notification))
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|error| SinkError::Chat(error.to_string()))
    }
}

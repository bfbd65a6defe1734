//! Toast notifications for the TUI
//!
//! Connection changes, incoming mail and failed loads pop up as toasts in
//! the bottom-right corner and dismiss themselves after a few seconds.

use std::collections::VecDeque;
use std::time::Duration;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};
use tokio::time::Instant;

/// Maximum number of toasts to display at once
const MAX_VISIBLE_TOASTS: usize = 3;

/// Default auto-dismiss duration
const DEFAULT_DISMISS: Duration = Duration::from_secs(5);

/// Toasts kept before the oldest are dropped unseen
const MAX_PENDING_TOASTS: usize = 20;

/// Notification level (determines styling)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn color(&self) -> Color {
        match self {
            NotificationLevel::Info => Color::Blue,
            NotificationLevel::Success => Color::Green,
            NotificationLevel::Warning => Color::Yellow,
            NotificationLevel::Error => Color::Red,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "ℹ",
            NotificationLevel::Success => "✓",
            NotificationLevel::Warning => "⚠",
            NotificationLevel::Error => "✗",
        }
    }
}

/// A single toast notification
#[derive(Debug, Clone)]
pub struct Toast {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Instant,
    /// How long before auto-dismiss (None = manual dismiss only)
    pub duration: Option<Duration>,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.duration
            .is_some_and(|duration| now.saturating_duration_since(self.created_at) >= duration)
    }
}

/// Active toasts, newest first.
#[derive(Debug, Default)]
pub struct NotificationManager {
    toasts: VecDeque<Toast>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a toast that dismisses itself.
    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>, now: Instant) {
        self.push(Toast {
            level,
            message: message.into(),
            created_at: now,
            duration: Some(DEFAULT_DISMISS),
        });
    }

    /// Add a toast that stays until dismissed.
    pub fn sticky(&mut self, level: NotificationLevel, message: impl Into<String>, now: Instant) {
        self.push(Toast {
            level,
            message: message.into(),
            created_at: now,
            duration: None,
        });
    }

    fn push(&mut self, toast: Toast) {
        self.toasts.push_front(toast);
        self.toasts.truncate(MAX_PENDING_TOASTS);
    }

    /// Remove expired toasts. Returns whether anything was removed.
    pub fn cleanup(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| !toast.is_expired(now));
        self.toasts.len() != before
    }

    /// Dismiss the oldest visible toast
    pub fn dismiss_oldest(&mut self) {
        let visible = self.toasts.len().min(MAX_VISIBLE_TOASTS);
        if visible > 0 {
            self.toasts.remove(visible - 1);
        }
    }

    pub fn visible_toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter().take(MAX_VISIBLE_TOASTS)
    }

    /// Toasts waiting behind the visible ones
    pub fn overflow_count(&self) -> usize {
        self.toasts.len().saturating_sub(MAX_VISIBLE_TOASTS)
    }

    /// Paint visible toasts stacked upward from the bottom-right of `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let width = area.width.min(50);
        let mut bottom = area.y + area.height;
        for toast in self.visible_toasts() {
            if bottom < area.y + 3 {
                break;
            }
            let rect = Rect::new(area.x + area.width - width, bottom - 3, width, 3);
            let text = Line::from(vec![
                Span::styled(
                    format!("{} ", toast.level.icon()),
                    Style::default().fg(toast.level.color()),
                ),
                Span::raw(toast.message.clone()),
            ]);
            let widget = Paragraph::new(text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(toast.level.color())),
            );
            frame.render_widget(Clear, rect);
            frame.render_widget(widget, rect);
            bottom -= 3;
        }
        let overflow = self.overflow_count();
        if overflow > 0 && bottom > area.y {
            let rect = Rect::new(area.x + area.width - width, bottom - 1, width, 1);
            let more = Paragraph::new(format!("+{} more (x: dismiss)", overflow))
                .alignment(Alignment::Right)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(Clear, rect);
            frame.render_widget(more, rect);
        }
    }
}

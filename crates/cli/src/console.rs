// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Terminal renditions of the launcher collaborators

use std::sync::Mutex;

use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use dialoguer::Confirm;

use tunnel_launcher_common::{LogCategory, LogEntry, LogLevel, NotificationMode};
use tunnel_launcher_core::{LogSink, StatusColor, TunnelView, UserPrompt};

/// Prints daemon log lines; alert entries become notifications
pub struct ConsoleLogSink {
    notification_mode: Mutex<NotificationMode>,
}

impl ConsoleLogSink {
    pub fn new(notification_mode: NotificationMode) -> Self {
        Self {
            notification_mode: Mutex::new(notification_mode),
        }
    }

    pub fn set_notification_mode(&self, mode: NotificationMode) {
        *self.notification_mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    fn show_alert(&self, entry: &LogEntry) -> bool {
        match *self.notification_mode.lock().unwrap_or_else(|e| e.into_inner()) {
            NotificationMode::ShowAll => true,
            NotificationMode::SuppressAll => false,
            NotificationMode::SuppressInfo => entry.level > LogLevel::Info,
        }
    }
}

impl LogSink for ConsoleLogSink {
    fn append(&self, entry: LogEntry) {
        if entry.category == LogCategory::Alert {
            if self.show_alert(&entry) {
                println!("{} {}", "[notice]".bold().cyan(), entry.text);
            }
            return;
        }

        let line = entry.format_line();
        let line = match entry.level {
            LogLevel::Debug => line.dimmed(),
            LogLevel::Info => line.normal(),
            LogLevel::Warn => line.yellow(),
            LogLevel::Error | LogLevel::Fatal => line.red(),
        };
        println!("{}", line);
    }
}

/// Blocking yes/no questions on the terminal
pub struct TerminalPrompt {
    /// Answer every question with yes
    pub assume_yes: bool,
}

impl UserPrompt for TerminalPrompt {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            println!("{}", message);
            return true;
        }
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn warn(&self, message: &str) {
        println!("{}", format!("⚠️  {}", message).yellow());
    }

    fn report(&self, message: &str) {
        println!("{}", message.bold());
    }
}

pub fn print_tunnels_table(views: &[TunnelView]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(
        ["ID", "Name", "Node", "Type", "Enabled", "Status", "Note"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan)),
    );

    for view in views {
        let status_color = match view.status_color {
            StatusColor::Green => Color::Green,
            StatusColor::Orange => Color::Yellow,
            StatusColor::Red => Color::Red,
            StatusColor::Gray => Color::DarkGrey,
        };
        let note = if view.note_empty { "-" } else { view.note.as_str() };

        table.add_row(vec![
            Cell::new(view.id),
            Cell::new(&view.name).fg(Color::Green),
            Cell::new(&view.node_name),
            Cell::new(&view.kind),
            Cell::new(if view.enabled { "yes" } else { "no" }),
            Cell::new(view.status_text).fg(status_color),
            Cell::new(note).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{}", table);
}

//! Operator interaction surface.
//!
//! The engine asks a human only for what it cannot infer, such as an enable
//! secret. Errors are never reported through this surface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;

/// Button layout of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buttons {
    Ok,
    OkCancel,
    YesNo,
    YesNoCancel,
}

/// Button the operator picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Ok,
    Cancel,
    Yes,
    No,
}

/// A human (or stand-in) the engine can ask for input.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show `text` and return the chosen button.
    async fn message(&self, text: &str, title: &str, buttons: Buttons) -> Button;

    /// Ask for free text. `None` when the operator cancels or leaves it empty.
    async fn prompt(&self, text: &str, title: &str, mask: bool) -> Option<String>;

    /// Ask for a file. `None` when the operator cancels.
    async fn choose_file(&self, title: &str, filter: &str) -> Option<PathBuf>;
}

/// Operator for unattended runs: cancels everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOperator;

#[async_trait]
impl Operator for NoOperator {
    async fn message(&self, _text: &str, title: &str, _buttons: Buttons) -> Button {
        debug!("No operator available to answer '{}'", title);
        Button::Cancel
    }

    async fn prompt(&self, _text: &str, title: &str, _mask: bool) -> Option<String> {
        debug!("No operator available to answer '{}'", title);
        None
    }

    async fn choose_file(&self, title: &str, _filter: &str) -> Option<PathBuf> {
        debug!("No operator available to answer '{}'", title);
        None
    }
}

/// Operator on the controlling terminal (stdin/stdout).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    async fn read_line(question: String) -> Option<String> {
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            write!(stdout, "{}", question).ok()?;
            stdout.flush().ok()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).ok()?;
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn message(&self, text: &str, title: &str, buttons: Buttons) -> Button {
        let choices = match buttons {
            Buttons::Ok => "[Enter] ",
            Buttons::OkCancel => "[o]k/[c]ancel: ",
            Buttons::YesNo => "[y]es/[n]o: ",
            Buttons::YesNoCancel => "[y]es/[n]o/[c]ancel: ",
        };
        loop {
            let answer = Self::read_line(format!("== {title} ==\n{text}\n{choices}")).await;
            let Some(answer) = answer else {
                return Button::Cancel;
            };
            let picked = match (buttons, answer.trim().to_lowercase().as_str()) {
                (Buttons::Ok, _) => Some(Button::Ok),
                (Buttons::OkCancel, "o" | "ok" | "") => Some(Button::Ok),
                (Buttons::YesNo | Buttons::YesNoCancel, "y" | "yes") => Some(Button::Yes),
                (Buttons::YesNo | Buttons::YesNoCancel, "n" | "no") => Some(Button::No),
                (Buttons::OkCancel | Buttons::YesNoCancel, "c" | "cancel") => Some(Button::Cancel),
                _ => None,
            };
            if let Some(button) = picked {
                return button;
            }
        }
    }

    async fn prompt(&self, text: &str, title: &str, mask: bool) -> Option<String> {
        if mask {
            debug!("Prompting operator for hidden input '{}'", title);
        } else {
            debug!("Prompting operator for '{}'", title);
        }
        Self::read_line(format!("{title}: {text} ")).await.filter(|s| !s.is_empty())
    }

    async fn choose_file(&self, title: &str, filter: &str) -> Option<PathBuf> {
        Self::read_line(format!("{title} ({filter}), blank to cancel: "))
            .await
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_operator_cancels_everything() {
        let operator = NoOperator;
        assert_eq!(
            operator.message("Run?", "Check Mode", Buttons::YesNoCancel).await,
            Button::Cancel
        );
        assert!(operator.prompt("Secret", "Enable", true).await.is_none());
        assert!(operator.choose_file("Output", "*.txt").await.is_none());
    }
}

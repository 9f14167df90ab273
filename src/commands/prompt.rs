//! Terminal front-end for the confirmation service.
//!
//! Renders each dialog on stderr and reads the answer from stdin. End of input
//! counts as dismissing the dialog.

use anyhow::Result;
use s7_admin::{ActiveDialog, ConfirmVariant, ConfirmationService, DialogResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct TerminalPrompt {
    service: ConfirmationService,
    /// Answer every dialog with "yes" without reading stdin
    assume_yes: bool,
    /// Reason used for reason-collecting dialogs when `assume_yes` is set
    default_reason: Option<String>,
}

impl TerminalPrompt {
    pub fn new(service: ConfirmationService, assume_yes: bool) -> Self {
        Self {
            service,
            assume_yes,
            default_reason: None,
        }
    }

    pub fn with_default_reason(mut self, reason: Option<String>) -> Self {
        self.default_reason = reason;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                warn!("Confirmation prompt stopped: {}", e);
                self.service.cancel_all();
            }
        })
    }

    async fn run(&self) -> Result<()> {
        let mut updates = self.service.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let dialog = updates.wait_for(|d| d.is_some()).await?.clone();
            let Some(dialog) = dialog else {
                continue;
            };

            render(&dialog).await?;
            let response = if self.assume_yes {
                if dialog.options.ask_reason {
                    let reason = self.default_reason.clone().unwrap_or_default();
                    self.service.set_reason(reason);
                }
                eprintln!("(answered yes by --yes)");
                DialogResponse::Accept
            } else {
                self.ask(&dialog, &mut lines).await?
            };

            debug!("Answering confirmation {} with {:?}", dialog.id, response);
            self.service.respond(dialog.id, response);
        }
    }

    async fn ask(
        &self,
        dialog: &ActiveDialog,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> Result<DialogResponse> {
        if dialog.options.ask_reason {
            let placeholder = dialog.options.reason_placeholder.as_deref().unwrap_or("Reason");
            write_prompt(&format!("{}: ", placeholder)).await?;
            match lines.next_line().await? {
                Some(reason) => {
                    self.service.set_reason(reason);
                }
                None => return Ok(DialogResponse::Dismiss),
            }
        }

        write_prompt(&format!(
            "{} / {} [y/N] ",
            dialog.options.confirm_label, dialog.options.cancel_label
        ))
        .await?;

        Ok(match lines.next_line().await? {
            Some(answer) if is_yes(&answer) => DialogResponse::Accept,
            Some(_) => DialogResponse::Cancel,
            None => DialogResponse::Dismiss,
        })
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn render(dialog: &ActiveDialog) -> Result<()> {
    let marker = match dialog.options.variant {
        ConfirmVariant::Danger => "[!] ",
        ConfirmVariant::Default => "",
    };

    let mut text = format!("\n{}{}\n", marker, dialog.options.title);
    if let Some(description) = &dialog.options.description {
        text.push_str(description);
        text.push('\n');
    }
    write_prompt(&text).await
}

async fn write_prompt(text: &str) -> Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(text.as_bytes()).await?;
    stderr.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }
}

pub mod prompt;
pub mod request;
pub mod session;

use anyhow::Result;
use serde::Serialize;

pub use prompt::TerminalPrompt;
pub use request::{handle_ban, handle_delete, handle_request};
pub use session::{handle_login, handle_logout, handle_register, handle_whoami};

/// Pretty-print a response on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Where the client gets a secret when the host asks for one.

use dialoguer::Password;
use std::io::IsTerminal;

/// Supplies the shared secret on demand. `None` means the caller has no way
/// to provide one and the fetch must stop.
pub trait CredentialSource {
    fn secret(&self) -> Option<String>;
}

/// A secret known up front, e.g. from a flag.
pub struct StaticCredential(pub Option<String>);

impl CredentialSource for StaticCredential {
    fn secret(&self) -> Option<String> {
        self.0.clone().filter(|s| !s.is_empty())
    }
}

/// Asks on the terminal without echo. Yields nothing when stdin is not a
/// terminal.
pub struct TerminalPrompt;

impl CredentialSource for TerminalPrompt {
    fn secret(&self) -> Option<String> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        match Password::new().with_prompt("Enter password").interact() {
            Ok(secret) => Some(secret).filter(|s| !s.is_empty()),
            Err(err) => {
                tracing::warn!("password prompt failed: {err}");
                None
            }
        }
    }
}

/// First source that yields a secret wins.
pub struct FirstOf<A, B>(pub A, pub B);

impl<A: CredentialSource, B: CredentialSource> CredentialSource for FirstOf<A, B> {
    fn secret(&self) -> Option<String> {
        self.0.secret().or_else(|| self.1.secret())
    }
}

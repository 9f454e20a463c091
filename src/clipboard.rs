//! Write-only clipboard access.
use anyhow::Result;
use tracing::{debug, warn};

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard, opened fresh for every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        arboard::Clipboard::new().and_then(|mut c| c.set_text(text))?;
        Ok(())
    }
}

/// Copy `text`, reporting success. Failures are logged, never raised.
pub fn copy_to_clipboard(clipboard: &mut dyn Clipboard, text: &str) -> bool {
    match clipboard.set_text(text) {
        Ok(()) => {
            debug!(len = text.len(), "copied to clipboard");
            true
        }
        Err(err) => {
            warn!(?err, "failed to copy to clipboard");
            false
        }
    }
}

//! Output abstraction layer for tapkey
//!
//! This crate owns the physical side of key output: the [`KeyEvent`] type
//! produced by the keyboard composer, the virtual-key code table, and the
//! [`KeySink`] trait implemented by each injection backend:
//!
//! - uinput virtual keyboard (Linux, `uinput` feature)
//! - dry-run logger
//! - in-memory recorder (tests)

pub mod error;
pub mod types;
pub mod vk;

mod dry_run;
mod recording;
#[cfg(all(target_os = "linux", feature = "uinput"))]
mod uinput;

pub use dry_run::DryRunSink;
pub use error::OutputError;
pub use recording::RecordingSink;
pub use types::{KeyCode, KeyEvent};
#[cfg(all(target_os = "linux", feature = "uinput"))]
pub use uinput::UinputKeyboard;

/// The injection primitive - all backends implement this
///
/// Events in a batch must be injected in order. The return value is the
/// number of events actually accepted; callers treat a short count as a
/// logged condition, not a failure.
pub trait KeySink: Send {
    /// Inject an ordered batch of key events
    fn send_batch(&mut self, events: &[KeyEvent]) -> Result<usize, OutputError>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

impl<S: KeySink + ?Sized> KeySink for Box<S> {
    fn send_batch(&mut self, events: &[KeyEvent]) -> Result<usize, OutputError> {
        (**self).send_batch(events)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

//! Tap replay scripts.
//!
//! A script stands in for the controller driver: it lists taps, pauses and
//! connection changes that are fed to the engine as [`DeviceEvent`]s.
//!
//! # Syntax
//!
//! ```text
//! connect                      # device connected
//! ----. 100ms ----.            # double tap of the thumb
//! ---.-, 400ms, ..---          # commas work as separators too
//! disconnect
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::device::DeviceEvent;
use crate::tapmap::{annotation, parse_annotation};

/// Device id reported by scripted connect/disconnect events
pub const REPLAY_DEVICE_ID: &str = "replay";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown token \"{token}\"")]
    UnknownToken { line: usize, token: String },

    #[error("line {line}: invalid pause \"{token}\"")]
    InvalidPause { line: usize, token: String },

    #[error("line {line}: \"{token}\" is not a tap (mask is empty)")]
    EmptyTap { line: usize, token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Tap(u8),
    Pause(Duration),
    Connect,
    Disconnect,
}

impl ScriptStep {
    /// Device event for this step; `None` for pauses
    pub fn event(&self) -> Option<DeviceEvent> {
        match *self {
            ScriptStep::Tap(mask) => Some(DeviceEvent::Tap { mask }),
            ScriptStep::Pause(_) => None,
            ScriptStep::Connect => Some(DeviceEvent::Connected {
                device_id: REPLAY_DEVICE_ID.to_string(),
                name: "Replay".to_string(),
                firmware: 0,
            }),
            ScriptStep::Disconnect => Some(DeviceEvent::Disconnected {
                device_id: REPLAY_DEVICE_ID.to_string(),
            }),
        }
    }
}

impl fmt::Display for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptStep::Tap(mask) => write!(f, "{}", annotation(*mask)),
            ScriptStep::Pause(d) => write!(f, "{}ms", d.as_millis()),
            ScriptStep::Connect => write!(f, "connect"),
            ScriptStep::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Parsed replay script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

fn parse_pause(token: &str, line: usize) -> Result<Duration, ScriptError> {
    token
        .strip_suffix("ms")
        .and_then(|n| n.parse::<u64>().ok())
        .map(Duration::from_millis)
        .ok_or_else(|| ScriptError::InvalidPause {
            line,
            token: token.to_string(),
        })
}

fn parse_token(token: &str, line: usize) -> Result<ScriptStep, ScriptError> {
    if token.eq_ignore_ascii_case("connect") {
        return Ok(ScriptStep::Connect);
    }
    if token.eq_ignore_ascii_case("disconnect") {
        return Ok(ScriptStep::Disconnect);
    }
    if token.ends_with("ms") {
        return parse_pause(token, line).map(ScriptStep::Pause);
    }
    match parse_annotation(token) {
        Some(0) => Err(ScriptError::EmptyTap {
            line,
            token: token.to_string(),
        }),
        Some(mask) => Ok(ScriptStep::Tap(mask)),
        None => Err(ScriptError::UnknownToken {
            line,
            token: token.to_string(),
        }),
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for (i, raw) in s.lines().enumerate() {
            let content = raw.split('#').next().unwrap_or_default();
            for token in content
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
            {
                steps.push(parse_token(token, i + 1)?);
            }
        }
        Ok(Script { steps })
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let script: Script = content.parse()?;
        info!(
            "Loaded script {} ({} taps, {:?} total)",
            path.display(),
            script.tap_count(),
            script.duration()
        );
        Ok(script)
    }

    pub fn tap_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, ScriptStep::Tap(_)))
            .count()
    }

    /// Sum of all pauses
    pub fn duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|s| match s {
                ScriptStep::Pause(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }

    /// Feed the script into `tx`, sleeping through pauses.
    ///
    /// Stops early when `running` is cleared or the receiver is gone.
    /// Returns the number of events delivered.
    pub async fn replay(&self, tx: mpsc::Sender<DeviceEvent>, running: Arc<AtomicBool>) -> usize {
        let mut sent = 0;
        for step in &self.steps {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match step.event() {
                Some(event) => {
                    debug!("replay {step}");
                    if tx.send(event).await.is_err() {
                        break;
                    }
                    sent += 1;
                }
                None => {
                    if let ScriptStep::Pause(d) = step {
                        tokio::time::sleep(*d).await;
                    }
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_separators_and_comments() {
        let script: Script = "connect # hello\n----. 100ms, ---.-\n\n# only a comment\ndisconnect"
            .parse()
            .unwrap();
        assert_eq!(
            script.steps,
            vec![
                ScriptStep::Connect,
                ScriptStep::Tap(1),
                ScriptStep::Pause(Duration::from_millis(100)),
                ScriptStep::Tap(2),
                ScriptStep::Disconnect,
            ]
        );
        assert_eq!(script.tap_count(), 2);
        assert_eq!(script.duration(), Duration::from_millis(100));
    }

    #[test]
    fn errors_carry_line_and_token() {
        let err = "----.\n..--x".parse::<Script>().unwrap_err();
        assert!(
            matches!(err, ScriptError::UnknownToken { line: 2, ref token } if token == "..--x")
        );
        assert_eq!(err.to_string(), "line 2: unknown token \"..--x\"");

        assert!(matches!(
            "abcms".parse::<Script>(),
            Err(ScriptError::InvalidPause { line: 1, .. })
        ));
        assert!(matches!(
            "-----".parse::<Script>(),
            Err(ScriptError::EmptyTap { line: 1, .. })
        ));
    }

    #[test]
    fn display_is_parseable() {
        let text = "connect .---- 250ms ..... disconnect";
        let script: Script = text.parse().unwrap();
        assert_eq!(script.to_string(), text);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_sends_events_in_order() {
        let script: Script = "connect ----. 50ms ---.- disconnect".parse().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let running = Arc::new(AtomicBool::new(true));

        let started = tokio::time::Instant::now();
        let sent = script.replay(tx, running).await;
        assert_eq!(sent, 4);
        assert!(started.elapsed() >= Duration::from_millis(50));

        assert!(matches!(rx.recv().await, Some(DeviceEvent::Connected { .. })));
        assert_eq!(rx.recv().await, Some(DeviceEvent::Tap { mask: 1 }));
        assert_eq!(rx.recv().await, Some(DeviceEvent::Tap { mask: 2 }));
        assert!(matches!(rx.recv().await, Some(DeviceEvent::Disconnected { .. })));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_stops_when_cleared() {
        let script: Script = "----. ----.".parse().unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let running = Arc::new(AtomicBool::new(false));
        assert_eq!(script.replay(tx, running).await, 0);
    }
}

//! File-mailbox command relay.
//!
//! An external producer drops one pending-command payload (opaque JSON) at
//! a well-known path. The session drains it on a fixed cadence: read,
//! publish, delete. Internally the payload passes through a queue bounded
//! at one entry (the mailbox is never re-read while a payload is queued),
//! keeping the mailbox file a boundary concern.
//!
//! Delivery is at most once: the marker is deleted after the publish
//! attempt whether or not it succeeded.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opaque command payload, forwarded unmodified to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub payload: Vec<u8>,
}

pub struct CommandRelay {
    mailbox: PathBuf,
    queue: VecDeque<PendingCommand>,
}

impl CommandRelay {
    pub fn new(mailbox: impl Into<PathBuf>) -> Self {
        Self {
            mailbox: mailbox.into(),
            queue: VecDeque::new(),
        }
    }

    pub fn mailbox(&self) -> &Path {
        &self.mailbox
    }

    /// Read the mailbox into the queue if a payload is waiting.
    ///
    /// The marker file is left in place until [`clear_mailbox`]; a payload
    /// still queued from this tick is not re-read.
    ///
    /// [`clear_mailbox`]: CommandRelay::clear_mailbox
    pub fn poll_mailbox(&mut self) -> io::Result<()> {
        // The no-re-read rule bounds the queue at one pending command.
        if !self.queue.is_empty() {
            return Ok(());
        }
        if !self.mailbox.exists() {
            return Ok(());
        }
        let payload = std::fs::read(&self.mailbox)?;
        self.queue.push_back(PendingCommand { payload });
        debug!(path = %self.mailbox.display(), "pending command queued");
        Ok(())
    }

    /// Pop the next queued command, if any.
    pub fn next(&mut self) -> Option<PendingCommand> {
        self.queue.pop_front()
    }

    /// Delete the mailbox marker after a publish attempt. A marker already
    /// gone is not an error.
    pub fn clear_mailbox(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.mailbox) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_in_tempdir() -> (tempfile::TempDir, CommandRelay) {
        let dir = tempfile::tempdir().unwrap();
        let relay = CommandRelay::new(dir.path().join("cmdIn.json"));
        (dir, relay)
    }

    #[test]
    fn test_empty_mailbox_yields_nothing() {
        let (_dir, mut relay) = relay_in_tempdir();
        relay.poll_mailbox().unwrap();
        assert_eq!(relay.next(), None);
    }

    #[test]
    fn test_payload_flows_through_queue() {
        let (_dir, mut relay) = relay_in_tempdir();
        std::fs::write(relay.mailbox(), br#"{"cmd":1}"#).unwrap();

        relay.poll_mailbox().unwrap();
        let command = relay.next().unwrap();
        assert_eq!(command.payload, br#"{"cmd":1}"#);
        assert_eq!(relay.next(), None);
    }

    #[test]
    fn test_marker_survives_until_cleared() {
        let (_dir, mut relay) = relay_in_tempdir();
        std::fs::write(relay.mailbox(), br#"{"cmd":1}"#).unwrap();

        relay.poll_mailbox().unwrap();
        assert!(relay.mailbox().exists());

        relay.clear_mailbox().unwrap();
        assert!(!relay.mailbox().exists());
    }

    #[test]
    fn test_queued_payload_not_reread() {
        let (_dir, mut relay) = relay_in_tempdir();
        std::fs::write(relay.mailbox(), br#"{"cmd":1}"#).unwrap();

        relay.poll_mailbox().unwrap();
        // An overwritten mailbox is ignored while a payload is queued;
        // the queue holds at most one pending command.
        std::fs::write(relay.mailbox(), br#"{"cmd":2}"#).unwrap();
        relay.poll_mailbox().unwrap();

        let command = relay.next().unwrap();
        assert_eq!(command.payload, br#"{"cmd":1}"#);
        assert_eq!(relay.next(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_dir, relay) = relay_in_tempdir();
        relay.clear_mailbox().unwrap();
        relay.clear_mailbox().unwrap();
    }
}

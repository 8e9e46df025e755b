use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

/// Navigable history holding the wizard's step token.
///
/// Mirrors the browser location hash: the controller pushes a token on
/// every navigation and listens for changes made from outside (back and
/// forward).
pub trait History: Send + Sync {
    /// Token of the current entry, `None` for the bare root location.
    fn current_token(&self) -> Option<String>;

    /// Makes `token` the current entry.
    fn push(&self, token: Option<&str>);

    /// Notifications of externally driven position changes.
    fn subscribe(&self) -> broadcast::Receiver<Option<String>>;
}

struct Entries {
    stack: Vec<Option<String>>,
    cursor: usize,
}

/// In-process history with browser-like back/forward semantics.
///
/// `push` drops any forward entries and does not notify subscribers;
/// `back` and `forward` move the cursor and notify.
pub struct MemoryHistory {
    entries: Mutex<Entries>,
    notify: broadcast::Sender<Option<String>>,
}

impl MemoryHistory {
    pub fn new(initial: Option<&str>) -> Self {
        let (notify, _) = broadcast::channel(32);
        Self {
            entries: Mutex::new(Entries {
                stack: vec![initial.map(str::to_string)],
                cursor: 0,
            }),
            notify,
        }
    }

    /// Moves one entry back. Returns `false` at the oldest entry.
    pub fn back(&self) -> bool {
        let token = {
            let mut entries = self.lock();
            if entries.cursor == 0 {
                return false;
            }
            entries.cursor -= 1;
            entries.stack[entries.cursor].clone()
        };
        self.announce(token);
        true
    }

    /// Moves one entry forward. Returns `false` at the newest entry.
    pub fn forward(&self) -> bool {
        let token = {
            let mut entries = self.lock();
            if entries.cursor + 1 >= entries.stack.len() {
                return false;
            }
            entries.cursor += 1;
            entries.stack[entries.cursor].clone()
        };
        self.announce(token);
        true
    }

    /// Number of entries, including forward ones.
    pub fn len(&self) -> usize {
        self.lock().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().stack.is_empty()
    }

    fn announce(&self, token: Option<String>) {
        // No subscribers is fine; the change is still recorded.
        let _ = self.notify.send(token);
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl History for MemoryHistory {
    fn current_token(&self) -> Option<String> {
        let entries = self.lock();
        entries.stack[entries.cursor].clone()
    }

    fn push(&self, token: Option<&str>) {
        let mut entries = self.lock();
        let token = token.map(str::to_string);
        if entries.stack[entries.cursor] == token {
            return;
        }
        let keep = entries.cursor + 1;
        entries.stack.truncate(keep);
        entries.stack.push(token);
        entries.cursor = keep;
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<String>> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_current() {
        let history = MemoryHistory::default();
        assert_eq!(history.current_token(), None);

        history.push(Some("step1"));
        history.push(Some("step2"));

        assert_eq!(history.current_token().as_deref(), Some("step2"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_repeated_push_does_not_duplicate() {
        let history = MemoryHistory::new(Some("step1"));
        history.push(Some("step1"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_back_forward_and_truncate() {
        let history = MemoryHistory::default();
        history.push(Some("step1"));
        history.push(Some("step2"));

        assert!(history.back());
        assert_eq!(history.current_token().as_deref(), Some("step1"));
        assert!(history.back());
        assert_eq!(history.current_token(), None);
        assert!(!history.back());

        assert!(history.forward());
        history.push(Some("summary"));
        assert!(!history.forward());
        assert_eq!(history.len(), 3);
        assert_eq!(history.current_token().as_deref(), Some("summary"));
    }

    #[tokio::test]
    async fn test_back_notifies_subscribers_push_does_not() {
        let history = MemoryHistory::default();
        let mut rx = history.subscribe();

        history.push(Some("step3"));
        assert!(rx.try_recv().is_err());

        history.back();
        assert_eq!(rx.recv().await.expect("Should notify"), None);
    }
}

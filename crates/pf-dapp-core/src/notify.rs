use pf_api_types::{Notification, NotificationKind};
use std::cell::{Cell, RefCell};

/// Oldest toasts are dropped beyond this many; `expire` still reports them.
pub const MAX_VISIBLE: usize = 5;

struct Entry {
    notification: Notification,
    expires_at_ms: u64,
}

/// Queue of short-lived, dismissible messages.
pub struct NotificationCenter {
    default_ttl_ms: u64,
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
    /// Dropped on overflow, not yet handed back by `expire`.
    evicted: RefCell<Vec<u64>>,
}

impl NotificationCenter {
    pub fn new(default_ttl_ms: u64) -> Self {
        Self {
            default_ttl_ms,
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
            evicted: RefCell::new(Vec::new()),
        }
    }

    pub fn push(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        now_ms: u64,
    ) -> Notification {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let notification = Notification {
            id,
            kind,
            title: title.into(),
            message: message.into(),
            ttl_ms: self.default_ttl_ms,
        };

        let mut entries = self.entries.borrow_mut();
        entries.push(Entry {
            notification: notification.clone(),
            expires_at_ms: now_ms.saturating_add(self.default_ttl_ms),
        });
        if entries.len() > MAX_VISIBLE {
            let overflow = entries.len() - MAX_VISIBLE;
            let mut evicted = self.evicted.borrow_mut();
            evicted.extend(entries.drain(..overflow).map(|entry| entry.notification.id));
        }
        notification
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.notification.id != id);
        self.evicted.borrow_mut().retain(|evicted| *evicted != id);
        entries.len() != before
    }

    /// Removes everything whose ttl has elapsed; returns the removed ids,
    /// including any dropped on overflow since the last call.
    pub fn expire(&self, now_ms: u64) -> Vec<u64> {
        let mut expired: Vec<u64> = self.evicted.borrow_mut().drain(..).collect();
        self.entries.borrow_mut().retain(|entry| {
            let keep = entry.expires_at_ms > now_ms;
            if !keep {
                expired.push(entry.notification.id);
            }
            keep
        });
        expired
    }

    pub fn active(&self) -> Vec<Notification> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }
}

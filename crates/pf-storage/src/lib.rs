use anyhow::Result;
use std::cell::Cell;

/// Persists the "user explicitly disconnected" flag across page loads.
pub trait DisconnectFlagStore {
    fn load_disconnected(&self) -> Result<bool>;
    fn save_disconnected(&self, disconnected: bool) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryFlagStore {
    disconnected: Cell<bool>,
}

impl InMemoryFlagStore {
    pub fn with_flag(disconnected: bool) -> Self {
        Self {
            disconnected: Cell::new(disconnected),
        }
    }
}

impl DisconnectFlagStore for InMemoryFlagStore {
    fn load_disconnected(&self) -> Result<bool> {
        Ok(self.disconnected.get())
    }

    fn save_disconnected(&self, disconnected: bool) -> Result<()> {
        self.disconnected.set(disconnected);
        Ok(())
    }
}

impl<S: DisconnectFlagStore + ?Sized> DisconnectFlagStore for std::rc::Rc<S> {
    fn load_disconnected(&self) -> Result<bool> {
        (**self).load_disconnected()
    }

    fn save_disconnected(&self, disconnected: bool) -> Result<()> {
        (**self).save_disconnected(disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn flag_defaults_to_clear() {
        let store = InMemoryFlagStore::default();
        assert!(!store.load_disconnected().unwrap());
    }

    #[test]
    fn shared_handle_sees_writes() {
        let store = Rc::new(InMemoryFlagStore::default());
        let other = Rc::clone(&store);
        store.save_disconnected(true).unwrap();
        assert!(other.load_disconnected().unwrap());
        other.save_disconnected(false).unwrap();
        assert!(!store.load_disconnected().unwrap());
    }
}

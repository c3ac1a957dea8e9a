//! Client-provided filesystem/workspace roots (spec §4.6 `set_roots`/`roots`),
//! used to answer server-initiated `roots/list` requests.

use std::sync::Mutex;

use mcpclient_protocol::types::Root;

#[derive(Debug, Default)]
pub struct RootsStore {
    roots: Mutex<Vec<Root>>,
}

impl RootsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, roots: Vec<Root>) {
        *self.roots.lock().expect("roots mutex poisoned") = roots;
    }

    pub fn get(&self) -> Vec<Root> {
        self.roots.lock().expect("roots mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = RootsStore::new();
        store.set(vec![Root {
            uri: "file:///tmp".to_string(),
            name: Some("tmp".to_string()),
        }]);
        assert_eq!(store.get().len(), 1);
    }
}

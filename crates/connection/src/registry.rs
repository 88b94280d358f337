//! Per-event-type handler registry.

use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked with the payload of a matching inbound frame.
pub type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Identifies one registration returned by [`ConnectionManager::on`](crate::ConnectionManager::on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Maps event types to their handlers in registration order.
///
/// Registrations are never deduplicated: adding the same handler twice makes
/// it fire twice per event.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl HandlerRegistry {
    pub(crate) fn add(&mut self, event_type: &str, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes one registration. Returns `false` if it was not present.
    pub(crate) fn remove(&mut self, event_type: &str, id: HandlerId) -> bool {
        self.retain(event_type, |(hid, _)| *hid != id)
    }

    /// Removes every registration of `handler` (pointer identity).
    pub(crate) fn remove_handler(&mut self, event_type: &str, handler: &Handler) -> bool {
        self.retain(event_type, |(_, h)| !Arc::ptr_eq(h, handler))
    }

    /// Clones the current handler list so callers can invoke it without
    /// holding the registry.
    pub(crate) fn snapshot(&self, event_type: &str) -> Vec<Handler> {
        self.handlers
            .get(event_type)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    fn retain(
        &mut self,
        event_type: &str,
        keep: impl FnMut(&(HandlerId, Handler)) -> bool,
    ) -> bool {
        let Some(list) = self.handlers.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(keep);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(event_type);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler {
        let log = log.clone();
        Arc::new(move |_: &serde_json::Value| log.lock().unwrap().push(name))
    }

    fn fire(registry: &HandlerRegistry, event_type: &str) {
        for h in registry.snapshot(event_type) {
            h(&serde_json::Value::Null);
        }
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::default();
        reg.add("new_message", recorder(&log, "a"));
        reg.add("new_message", recorder(&log, "b"));
        reg.add("user_online", recorder(&log, "c"));

        fire(&reg, "new_message");
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn remove_by_id_leaves_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::default();
        let a = reg.add("new_message", recorder(&log, "a"));
        reg.add("new_message", recorder(&log, "b"));

        assert!(reg.remove("new_message", a));
        assert!(!reg.remove("new_message", a));
        fire(&reg, "new_message");
        assert_eq!(*log.lock().unwrap(), ["b"]);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::default();
        let h = recorder(&log, "dup");
        reg.add("new_message", h.clone());
        reg.add("new_message", h.clone());

        fire(&reg, "new_message");
        assert_eq!(log.lock().unwrap().len(), 2);

        assert!(reg.remove_handler("new_message", &h));
        assert_eq!(reg.count("new_message"), 0);
    }

    #[test]
    fn removing_absent_is_noop() {
        let mut reg = HandlerRegistry::default();
        let h: Handler = Arc::new(|_: &serde_json::Value| {});
        assert!(!reg.remove_handler("nothing", &h));
        let id = reg.add("x", h.clone());
        assert!(!reg.remove("other", id));
        assert_eq!(reg.count("x"), 1);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HandlerRegistry::default();
        let a = reg.add("t", recorder(&log, "a"));
        let snap = reg.snapshot("t");
        reg.remove("t", a);
        reg.add("t", recorder(&log, "late"));

        for h in snap {
            h(&serde_json::Value::Null);
        }
        assert_eq!(*log.lock().unwrap(), ["a"]);
    }

    #[test]
    fn unknown_type_has_no_handlers() {
        let reg = HandlerRegistry::default();
        assert!(reg.snapshot("mystery").is_empty());
    }
}

// Event dispatch: name → ordered handler list, built once before the network
// context starts and read-only afterwards.

use serde_json::Value;
use std::collections::HashMap;

type EventHandler = Box<dyn Fn(&Value) + Send + Sync>;
type RawHandler = Box<dyn Fn(&str) + Send + Sync>;

/// The handler registry for one bot's socket.
///
/// Raw handlers see every MESSAGE frame before event dispatch. Events with no
/// registered handler are ignored — the server's vocabulary grows
/// independently of this client.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Vec<EventHandler>>,
    raw: Vec<RawHandler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a named event, after any already registered.
    pub fn on(&mut self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Registers a handler that receives every MESSAGE frame verbatim.
    pub fn on_raw(&mut self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.raw.push(Box::new(handler));
    }

    pub fn dispatch(&self, event: &str, data: &Value) {
        if let Some(handlers) = self.handlers.get(event) {
            for handler in handlers {
                handler(data);
            }
        }
    }

    pub fn dispatch_raw(&self, frame: &str) {
        for handler in &self.raw {
            handler(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mut router = EventRouter::new();
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            router.on("ping", move |_| order.lock().unwrap().push(tag));
        }

        router.dispatch("ping", &Value::Null);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unknown_events_are_ignored() {
        let router = EventRouter::new();
        // No handlers registered; must not panic.
        router.dispatch("mystery", &json!({ "x": 1 }));
    }

    #[test]
    fn raw_handlers_see_the_frame_text() {
        let seen = std::sync::Arc::new(AtomicUsize::new(0));
        let mut router = EventRouter::new();
        {
            let seen = seen.clone();
            router.on_raw(move |frame| {
                assert!(frame.starts_with("42"));
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        router.dispatch_raw(r#"42["x",1]"#);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}

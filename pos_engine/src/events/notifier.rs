//! Synchronous, in-transaction publish/subscribe.
//!
//! Handlers are registered against event-name constants and run strictly in registration order, each receiving the
//! caller's [`Session`]. The first handler error stops the chain and is returned, and the caller's transaction is then
//! rolled back. Work that must not be rolled back with the transaction registers an after-commit hook on the session
//! instead of doing it inline.
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{db::sqlite::Session, events::HandlerError};

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

pub trait EventHandler<E>: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, event_name: &'a str, session: &'a mut Session, event: &'a E) -> HandlerFuture<'a>;
}

pub struct EventNotifier<E> {
    handlers: HashMap<&'static str, Vec<Arc<dyn EventHandler<E>>>>,
}

impl<E> Default for EventNotifier<E> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<E: Sync> EventNotifier<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event_name: &'static str, handler: Arc<dyn EventHandler<E>>) -> &mut Self {
        debug!("📬️ Registering handler {} for {event_name}", handler.name());
        self.handlers.entry(event_name).or_default().push(handler);
        self
    }

    pub fn register_all(&mut self, event_names: &[&'static str], handler: Arc<dyn EventHandler<E>>) -> &mut Self {
        for name in event_names {
            self.register(name, Arc::clone(&handler));
        }
        self
    }

    /// The names of the handlers subscribed to `event_name`, in the order they will run.
    pub fn handler_names(&self, event_name: &str) -> Vec<&'static str> {
        self.handlers.get(event_name).map(|hs| hs.iter().map(|h| h.name()).collect()).unwrap_or_default()
    }

    pub async fn fire(&self, event_name: &str, session: &mut Session, event: &E) -> Result<(), HandlerError> {
        let Some(handlers) = self.handlers.get(event_name) else {
            trace!("📬️ No handlers for {event_name}");
            return Ok(());
        };
        for handler in handlers {
            trace!("📬️ {event_name} -> {}", handler.name());
            if let Err(e) = handler.handle(event_name, session, event).await {
                warn!("📬️ Handler {} failed on {event_name}: {e}", handler.name());
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::test_utils::prepare_env::prepare_test_db;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl EventHandler<u32> for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(&'a self, event_name: &'a str, _session: &'a mut Session, event: &'a u32) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(format!("{}:{event_name}:{event}", self.name));
                if self.fail {
                    Err(HandlerError::MissingPayload("test"))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn recorder(name: &'static str, seen: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn EventHandler<u32>> {
        Arc::new(Recorder { name, seen: Arc::clone(seen), fail })
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let db = prepare_test_db().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = EventNotifier::<u32>::new();
        notifier.register("a", recorder("first", &seen, false));
        notifier.register("a", recorder("second", &seen, false));
        notifier.register("b", recorder("other", &seen, false));
        assert_eq!(notifier.handler_names("a"), vec!["first", "second"]);
        let mut session = db.begin().await.unwrap();
        notifier.fire("a", &mut session, &7).await.unwrap();
        notifier.fire("nobody", &mut session, &8).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first:a:7", "second:a:7"]);
    }

    #[tokio::test]
    async fn first_error_stops_the_chain() {
        let db = prepare_test_db().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = EventNotifier::<u32>::new();
        notifier.register("a", recorder("ok", &seen, false));
        notifier.register("a", recorder("boom", &seen, true));
        notifier.register("a", recorder("never", &seen, false));
        let mut session = db.begin().await.unwrap();
        let err = notifier.fire("a", &mut session, &1).await.unwrap_err();
        assert!(matches!(err, HandlerError::MissingPayload(_)));
        assert_eq!(*seen.lock().unwrap(), vec!["ok:a:1", "boom:a:1"]);
    }
}

use std::sync::Arc;

use log::*;

use crate::{
    db::sqlite::Session,
    events::{EventHandler, HandlerFuture, OrderEvent, StreamPublisher, StreamRecord},
};

/// Publishes a [`StreamRecord`] for every order event, but only once the surrounding transaction has committed. A
/// failed publish is logged and otherwise ignored.
#[derive(Clone)]
pub struct StreamHandler {
    publisher: Arc<dyn StreamPublisher>,
}

impl StreamHandler {
    pub fn new(publisher: Arc<dyn StreamPublisher>) -> Self {
        Self { publisher }
    }
}

impl EventHandler<OrderEvent> for StreamHandler {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn handle<'a>(&'a self, event_name: &'a str, session: &'a mut Session, event: &'a OrderEvent) -> HandlerFuture<'a> {
        Box::pin(async move {
            let record = StreamRecord::new(event_name, event);
            let publisher = Arc::clone(&self.publisher);
            session.after_commit(async move {
                let order_no = record.order.order_no.clone();
                let event_type = record.event_type.clone();
                if let Err(e) = publisher.publish(record).await {
                    warn!("📬️ Could not publish {event_type} for order {order_no}: {e}");
                }
            });
            Ok(())
        })
    }
}

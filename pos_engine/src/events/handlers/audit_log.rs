use log::*;
use serde_json::json;

use crate::{
    db::sqlite::{logs, Session},
    events::{EventHandler, HandlerFuture, OrderEvent},
};

/// Writes one `order_logs` row per order event.
#[derive(Debug, Clone, Default)]
pub struct AuditLogHandler;

impl EventHandler<OrderEvent> for AuditLogHandler {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    fn handle<'a>(&'a self, event_name: &'a str, session: &'a mut Session, event: &'a OrderEvent) -> HandlerFuture<'a> {
        Box::pin(async move {
            let order = &event.order;
            let content = json!({
                "status": order.status,
                "total_price": order.total_price,
                "discount": order.discount,
                "real_price": order.real_price,
                "paid": order.paid,
                "table_id": order.table_id,
                "previous_table_id": event.previous_table_id,
                "operated_items": event.operated_items,
                "payment": event.payment,
            });
            let content = serde_json::to_string(&content)?;
            let id = logs::insert_order_log(&order.order_no, event_name, &event.operator, &content, session.conn())
                .await?;
            trace!("🧾️ Audit log #{id}: {event_name} on {} by {}", order.order_no, event.operator);
            Ok(())
        })
    }
}

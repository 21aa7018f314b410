use log::*;

use crate::{
    db::sqlite::{logs, Session},
    events::{EventHandler, HandlerError, HandlerFuture, OrderEvent},
};

/// Records every applied payment in the `finance_logs` ledger. Subscribed to `order.paid`.
#[derive(Debug, Clone, Default)]
pub struct FinanceLogHandler;

impl EventHandler<OrderEvent> for FinanceLogHandler {
    fn name(&self) -> &'static str {
        "finance_log"
    }

    fn handle<'a>(&'a self, event_name: &'a str, session: &'a mut Session, event: &'a OrderEvent) -> HandlerFuture<'a> {
        Box::pin(async move {
            let paid = event.payment.as_ref().ok_or(HandlerError::MissingPayload("payment"))?;
            let order = &event.order;
            let id = logs::insert_finance_log(
                order.store_id,
                &order.order_no,
                paid.channel,
                paid.amount,
                paid.seq_no.as_deref(),
                session.conn(),
            )
            .await?;
            debug!("💳️ Finance log #{id} ({event_name}): {} {} for order {}", paid.channel, paid.amount, order.order_no);
            Ok(())
        })
    }
}

use std::sync::Arc;

use log::*;

use crate::{
    api::{order_objects::PaidParams, OrderDomainService},
    db::sqlite::Session,
    db_types::BusinessType,
    events::{EventHandler, HandlerFuture, PaymentEvent},
};

/// Drives the order `paid` transition when a provider confirms a payment. Subscribed to `payment.success`.
#[derive(Clone)]
pub struct OrderPaidTrigger {
    orders: Arc<OrderDomainService>,
}

impl OrderPaidTrigger {
    pub fn new(orders: Arc<OrderDomainService>) -> Self {
        Self { orders }
    }
}

impl EventHandler<PaymentEvent> for OrderPaidTrigger {
    fn name(&self) -> &'static str {
        "order_paid_trigger"
    }

    fn handle<'a>(
        &'a self,
        event_name: &'a str,
        session: &'a mut Session,
        event: &'a PaymentEvent,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let payment = &event.payment;
            match payment.business_type {
                BusinessType::Order => {
                    debug!("💳️ {event_name}: applying payment {} to order {}", payment.seq_no, payment.business_id);
                    let params = PaidParams::from_payment(payment, event.operator.clone());
                    self.orders.paid(session, params).await?;
                },
            }
            Ok(())
        })
    }
}

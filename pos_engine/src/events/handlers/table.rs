use log::*;

use crate::{
    db::sqlite::{tables, Session},
    db_types::{OrderNo, TableStatus},
    events::{
        EventHandler,
        HandlerError,
        HandlerFuture,
        OrderEvent,
        ORDER_CANCEL,
        ORDER_CREATE,
        ORDER_FINISH,
        ORDER_TURN_TABLE,
    },
};

/// Keeps dining-table occupancy in step with the orders seated at them.
///
/// * `order.create` occupies the order's table.
/// * `order.turn_table` occupies the new table and releases the previous one.
/// * `order.cancel` and `order.finish` release the order's table.
///
/// Occupying goes through the table compare-and-set and is never retried. A table that is released only goes back
/// to `Free` if it is still held by this order.
#[derive(Debug, Clone, Default)]
pub struct TableHandler;

pub const TABLE_EVENTS: [&str; 4] = [ORDER_CREATE, ORDER_TURN_TABLE, ORDER_CANCEL, ORDER_FINISH];

impl EventHandler<OrderEvent> for TableHandler {
    fn name(&self) -> &'static str {
        "table"
    }

    fn handle<'a>(&'a self, event_name: &'a str, session: &'a mut Session, event: &'a OrderEvent) -> HandlerFuture<'a> {
        Box::pin(async move {
            let order_no = &event.order.order_no;
            match event_name {
                ORDER_CREATE => {
                    if let Some(table_id) = event.order.table_id {
                        occupy(table_id, order_no, session).await?;
                    }
                },
                ORDER_TURN_TABLE => {
                    if let Some(table_id) = event.order.table_id {
                        occupy(table_id, order_no, session).await?;
                    }
                    if let Some(previous) = event.previous_table_id {
                        release(previous, order_no, session).await?;
                    }
                },
                ORDER_CANCEL | ORDER_FINISH => {
                    if let Some(table_id) = event.order.table_id {
                        release(table_id, order_no, session).await?;
                    }
                },
                _ => trace!("🧾️ Table handler ignores {event_name}"),
            }
            Ok(())
        })
    }
}

async fn occupy(table_id: i64, order_no: &OrderNo, session: &mut Session) -> Result<(), HandlerError> {
    let swapped = tables::update_order_id_and_status_from(
        table_id,
        Some(order_no),
        TableStatus::Free,
        TableStatus::Occupied,
        session.conn(),
    )
    .await?;
    if swapped {
        debug!("🧾️ Table {table_id} occupied by order {order_no}");
        return Ok(());
    }
    let table = tables::fetch_table(table_id, session.conn()).await?.ok_or(HandlerError::TableNotFound(table_id))?;
    match table.status {
        TableStatus::Occupied => Err(HandlerError::TableOccupied(table_id)),
        _ => Err(HandlerError::TableStateInvalid(table_id)),
    }
}

async fn release(table_id: i64, order_no: &OrderNo, session: &mut Session) -> Result<(), HandlerError> {
    let table = tables::fetch_table(table_id, session.conn()).await?.ok_or(HandlerError::TableNotFound(table_id))?;
    if table.order_no.as_ref() != Some(order_no) {
        debug!("🧾️ Table {table_id} is not held by order {order_no}. Leaving it as {}", table.status);
        return Ok(());
    }
    let swapped =
        tables::update_order_id_and_status_from(table_id, None, TableStatus::Occupied, TableStatus::Free, session.conn())
            .await?;
    if !swapped {
        return Err(HandlerError::TableStateInvalid(table_id));
    }
    debug!("🧾️ Table {table_id} released by order {order_no}");
    Ok(())
}

mod audit_log;
mod finance_log;
mod order_paid_trigger;
mod stream;
mod table;

pub use audit_log::AuditLogHandler;
pub use finance_log::FinanceLogHandler;
pub use order_paid_trigger::OrderPaidTrigger;
pub use stream::StreamHandler;
pub use table::{TableHandler, TABLE_EVENTS};

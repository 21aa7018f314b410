mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, Quantity, MONEY_SCALE};
pub use secret::Secret;

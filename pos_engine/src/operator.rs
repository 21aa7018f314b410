//! The identity of whoever is driving an operation.
//!
//! Every mutating operation takes an explicit [`Operator`]. It is recorded on the order (as the creator) and on every
//! audit log row.
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OperatorType {
    /// Front-of-house staff using a POS terminal.
    Frontend,
    /// Back-office staff.
    Backend,
    Admin,
    /// A customer ordering through a self-service channel.
    Customer,
    /// Internal processes, e.g. payment callbacks.
    System,
}

impl Display for OperatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorType::Frontend => write!(f, "Frontend"),
            OperatorType::Backend => write!(f, "Backend"),
            OperatorType::Admin => write!(f, "Admin"),
            OperatorType::Customer => write!(f, "Customer"),
            OperatorType::System => write!(f, "System"),
        }
    }
}

impl FromStr for OperatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            "system" => Ok(Self::System),
            _ => Err(format!("{s} is not an operator type")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operator {
    Frontend(OperatorInfo),
    Backend(OperatorInfo),
    Admin(OperatorInfo),
    Customer(OperatorInfo),
    System,
}

impl Operator {
    pub const SYSTEM_NAME: &'static str = "system";

    pub fn frontend<S: Into<String>>(id: i64, name: S) -> Self {
        Self::Frontend(OperatorInfo { id, name: name.into() })
    }

    pub fn backend<S: Into<String>>(id: i64, name: S) -> Self {
        Self::Backend(OperatorInfo { id, name: name.into() })
    }

    pub fn admin<S: Into<String>>(id: i64, name: S) -> Self {
        Self::Admin(OperatorInfo { id, name: name.into() })
    }

    pub fn customer<S: Into<String>>(id: i64, name: S) -> Self {
        Self::Customer(OperatorInfo { id, name: name.into() })
    }

    pub fn from_parts(operator_type: OperatorType, id: i64, name: &str) -> Self {
        match operator_type {
            OperatorType::Frontend => Self::frontend(id, name),
            OperatorType::Backend => Self::backend(id, name),
            OperatorType::Admin => Self::admin(id, name),
            OperatorType::Customer => Self::customer(id, name),
            OperatorType::System => Self::System,
        }
    }

    pub fn operator_type(&self) -> OperatorType {
        match self {
            Operator::Frontend(_) => OperatorType::Frontend,
            Operator::Backend(_) => OperatorType::Backend,
            Operator::Admin(_) => OperatorType::Admin,
            Operator::Customer(_) => OperatorType::Customer,
            Operator::System => OperatorType::System,
        }
    }

    fn info(&self) -> Option<&OperatorInfo> {
        match self {
            Operator::Frontend(i) | Operator::Backend(i) | Operator::Admin(i) | Operator::Customer(i) => Some(i),
            Operator::System => None,
        }
    }

    pub fn id(&self) -> i64 {
        self.info().map(|i| i.id).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.info().map(|i| i.name.as_str()).unwrap_or(Self::SYSTEM_NAME)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::System => write!(f, "System"),
            _ => write!(f, "{}[{}:{}]", self.operator_type(), self.id(), self.name()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn operators_round_trip_through_parts() {
        let op = Operator::frontend(12, "Alice");
        let back = Operator::from_parts(op.operator_type(), op.id(), op.name());
        assert_eq!(op, back);
        assert_eq!(op.to_string(), "Frontend[12:Alice]");
        assert_eq!(Operator::System.name(), "system");
        assert_eq!(Operator::System.id(), 0);
    }

    #[test]
    fn operator_types_parse() {
        assert_eq!("frontend".parse::<OperatorType>().unwrap(), OperatorType::Frontend);
        assert_eq!(" Admin ".parse::<OperatorType>().unwrap(), OperatorType::Admin);
        assert!("waiter".parse::<OperatorType>().is_err());
    }
}

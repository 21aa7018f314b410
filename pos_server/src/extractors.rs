//! Reads the [`Operator`] driving a request from its headers.
//!
//! Every mutating route needs an operator. The caller identifies itself with three headers:
//! * `X-Operator-Type`: one of `Frontend`, `Backend`, `Admin`, `Customer` or `System` (case-insensitive).
//! * `X-Operator-Id`: a numeric id. Not required for `System`.
//! * `X-Operator-Name`: a display name. Not required for `System`.
use std::{
    future::{ready, Ready},
    ops::Deref,
};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use log::debug;
use pos_engine::{Operator, OperatorType};

use crate::errors::ServerError;

pub const OPERATOR_TYPE_HEADER: &str = "X-Operator-Type";
pub const OPERATOR_ID_HEADER: &str = "X-Operator-Id";
pub const OPERATOR_NAME_HEADER: &str = "X-Operator-Name";

#[derive(Debug, Clone)]
pub struct RequestOperator(pub Operator);

impl Deref for RequestOperator {
    type Target = Operator;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for RequestOperator {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(operator_from_headers(req).map(RequestOperator).map_err(|e| {
            debug!("💻️ Rejecting request to {}. {e}", req.path());
            e
        }))
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Result<&'a str, ServerError> {
    req.headers()
        .get(name)
        .ok_or_else(|| ServerError::InvalidOperator(format!("{name} is missing")))?
        .to_str()
        .map_err(|e| ServerError::InvalidOperator(format!("{name} is not valid text. {e}")))
}

fn operator_from_headers(req: &HttpRequest) -> Result<Operator, ServerError> {
    let operator_type = header(req, OPERATOR_TYPE_HEADER)?.parse::<OperatorType>().map_err(ServerError::InvalidOperator)?;
    if operator_type == OperatorType::System {
        return Ok(Operator::System);
    }
    let id = header(req, OPERATOR_ID_HEADER)?
        .trim()
        .parse::<i64>()
        .map_err(|e| ServerError::InvalidOperator(format!("{OPERATOR_ID_HEADER} is not a number. {e}")))?;
    let name = header(req, OPERATOR_NAME_HEADER)?.trim();
    if name.is_empty() {
        return Err(ServerError::InvalidOperator(format!("{OPERATOR_NAME_HEADER} is empty")));
    }
    Ok(Operator::from_parts(operator_type, id, name))
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn frontend_operator() {
        let req = TestRequest::default()
            .insert_header((OPERATOR_TYPE_HEADER, "frontend"))
            .insert_header((OPERATOR_ID_HEADER, "7"))
            .insert_header((OPERATOR_NAME_HEADER, "Alice"))
            .to_http_request();
        assert_eq!(operator_from_headers(&req).unwrap(), Operator::frontend(7, "Alice"));
    }

    #[test]
    fn system_needs_no_identity() {
        let req = TestRequest::default().insert_header((OPERATOR_TYPE_HEADER, "System")).to_http_request();
        assert_eq!(operator_from_headers(&req).unwrap(), Operator::System);
    }

    #[test]
    fn bad_operators() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(operator_from_headers(&req), Err(ServerError::InvalidOperator(_))));
        let req = TestRequest::default()
            .insert_header((OPERATOR_TYPE_HEADER, "Admin"))
            .insert_header((OPERATOR_ID_HEADER, "seven"))
            .insert_header((OPERATOR_NAME_HEADER, "Bob"))
            .to_http_request();
        assert!(matches!(operator_from_headers(&req), Err(ServerError::InvalidOperator(_))));
        let req = TestRequest::default()
            .insert_header((OPERATOR_TYPE_HEADER, "Waiter"))
            .insert_header((OPERATOR_ID_HEADER, "7"))
            .insert_header((OPERATOR_NAME_HEADER, "Bob"))
            .to_http_request();
        assert!(matches!(operator_from_headers(&req), Err(ServerError::InvalidOperator(_))));
    }
}

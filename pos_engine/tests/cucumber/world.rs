use std::{collections::HashMap, fmt::Debug, sync::Arc};

use cucumber::World;
use pos_engine::{
    db_types::{OrderNo, Payment},
    test_utils::fixtures::TestSystem,
    OrderApi,
    OrderFlowError,
};

#[derive(Default, World)]
pub struct PosWorld {
    pub system: Option<TestSystem>,
    /// Orders by the name the scenario gave them
    pub orders: HashMap<String, OrderNo>,
    /// The latest provider payment started for each named order
    pub payments: HashMap<String, Payment>,
    pub last_error: Option<OrderFlowError>,
}

impl Debug for PosWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosWorld")
            .field("db", &self.system.as_ref().map(|s| s.db_url.as_str()))
            .field("orders", &self.orders)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PosWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The store has not been set up")
    }

    pub fn api(&self) -> Arc<OrderApi> {
        self.system().engine.api()
    }

    pub fn order_no(&self, name: &str) -> OrderNo {
        self.orders.get(name).cloned().unwrap_or_else(|| panic!("No order called {name}"))
    }

    /// Tables are numbered from 1 in scenarios.
    pub fn table_id(&self, number: usize) -> i64 {
        self.system().catalog.table(number - 1)
    }

    pub fn product_id(&self, name: &str) -> i64 {
        let catalog = &self.system().catalog;
        match name {
            "Coffee" => catalog.coffee.id,
            "Noodles" => catalog.noodles.id,
            "Banquet" => catalog.banquet.id,
            _ => panic!("Unknown product {name}"),
        }
    }
}

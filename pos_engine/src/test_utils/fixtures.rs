//! A seeded store and an engine whose payment gateways are scripted in memory.
use std::{sync::Arc, time::Duration};

use pos_common::Money;
use serde_json::json;

use crate::{
    db_types::{DiningTable, OptionKind, Product, ProductOption, ProductSpec},
    lock::{LockManager, LockOptions},
    operator::Operator,
    providers::{
        HuifuConfig,
        HuifuProvider,
        MemoryTransport,
        ProviderRegistry,
        RetryPolicy,
        ZhiXinHuaConfig,
        ZhiXinHuaPointsProvider,
        ZhiXinHuaWalletProvider,
        MICROPAY_PATH,
        POINTS_PAY_PATH,
        WALLET_PAY_PATH,
    },
    sequence::SequenceGenerator,
    test_utils::prepare_env::{create_database, random_db_path},
    PosEngine,
    PosEngineBuilder,
    SqliteDatabase,
};

pub const STORE_ID: i64 = 1;
pub const OTHER_STORE_ID: i64 = 2;
pub const HUIFU_MCH_ID: &str = "6666000100000001";
pub const ZXH_MERCHANT_NO: &str = "ZXH-M-0001";

/// What [`TestSystem::new`] puts in a fresh database.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Coffee, 25.00
    pub coffee: Product,
    /// Coffee, large: 30.00
    pub coffee_large: ProductSpec,
    /// Oat milk, +3.00
    pub oat_milk: ProductOption,
    /// Noodles, 48.00
    pub noodles: Product,
    /// Set menu, 5000.00
    pub banquet: Product,
    /// Disabled.
    pub retired: Product,
    /// Three tables in [`STORE_ID`]
    pub tables: Vec<DiningTable>,
    /// One table in [`OTHER_STORE_ID`]
    pub foreign_table: DiningTable,
}

impl Catalog {
    pub async fn seed(db: &SqliteDatabase) -> Self {
        let coffee = db.create_product(STORE_ID, "Coffee", Money::from(25)).await.expect("Error creating product");
        let coffee_large = db.create_spec(coffee.id, "Large", Money::from(30)).await.expect("Error creating spec");
        let oat_milk = db
            .create_option(coffee.id, OptionKind::Recipe, "Oat milk", Money::from(3))
            .await
            .expect("Error creating option");
        let noodles = db.create_product(STORE_ID, "Noodles", Money::from(48)).await.expect("Error creating product");
        let banquet = db.create_product(STORE_ID, "Banquet", Money::from(5000)).await.expect("Error creating product");
        let retired = db.create_product(STORE_ID, "Retired", Money::from(10)).await.expect("Error creating product");
        db.set_product_enabled(retired.id, false).await.expect("Error disabling product");
        let mut tables = Vec::new();
        for name in ["A1", "A2", "A3"] {
            tables.push(db.create_table(STORE_ID, name).await.expect("Error creating table"));
        }
        let foreign_table = db.create_table(OTHER_STORE_ID, "B1").await.expect("Error creating table");
        Self { coffee, coffee_large, oat_milk, noodles, banquet, retired, tables, foreign_table }
    }

    pub fn table(&self, index: usize) -> i64 {
        self.tables[index].id
    }
}

pub struct TestSystem {
    pub db_url: String,
    pub engine: PosEngine,
    pub catalog: Catalog,
    /// Every gateway shares this transport. Responses default to "accepted".
    pub transport: Arc<MemoryTransport>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_locks(LockManager::in_memory(test_lock_options())).await
    }

    pub async fn with_locks(locks: LockManager) -> Self {
        dotenvy::from_filename(".env.test").ok();
        let _ = env_logger::try_init();
        let db_url = random_db_path();
        create_database(&db_url).await;
        let db = SqliteDatabase::new_with_url(&db_url, 1).await.expect("Error creating connection to database");
        db.migrate().await.expect("Error running DB migrations");
        let catalog = Catalog::seed(&db).await;
        let transport = Arc::new(accepting_transport());
        let engine = PosEngineBuilder::new(db)
            .with_locks(locks)
            .with_sequences(SequenceGenerator::default())
            .with_providers(test_registry(Arc::clone(&transport)))
            .build();
        Self { db_url, engine, catalog, transport }
    }

    pub fn db(&self) -> &SqliteDatabase {
        self.engine.db()
    }
}

pub fn cashier() -> Operator {
    Operator::frontend(7, "Alice")
}

pub fn test_lock_options() -> LockOptions {
    LockOptions { expiry: Duration::from_secs(5), wait: Duration::from_millis(500), retry_delay: Duration::from_millis(5) }
}

/// A transport on which every gateway accepts every payment.
pub fn accepting_transport() -> MemoryTransport {
    let transport = MemoryTransport::new();
    transport
        .set_fallback(MICROPAY_PATH, json!({"resp_code": "00000100", "resp_desc": "processing", "trade_type": "T_MICROPAY"}))
        .set_fallback(POINTS_PAY_PATH, json!({"code": 0, "msg": "ok"}))
        .set_fallback(WALLET_PAY_PATH, json!({"code": 0, "msg": "ok"}));
    transport
}

pub fn test_registry(transport: Arc<MemoryTransport>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let zxh = ZhiXinHuaConfig {
        merchant_no: ZXH_MERCHANT_NO.to_string(),
        callback_retry: RetryPolicy { attempts: 2, delay: Duration::from_millis(10) },
    };
    registry
        .register(HuifuProvider::new(HuifuConfig { mch_id: HUIFU_MCH_ID.to_string() }, transport.clone()))
        .register(ZhiXinHuaPointsProvider::new(zxh.clone(), transport.clone()))
        .register(ZhiXinHuaWalletProvider::new(zxh, transport));
    registry
}

/// A Huifu asynchronous notification. `stat` is one of `S`, `F` or `P`.
pub fn huifu_notification(seq_no: &str, amount: Money, stat: &str) -> String {
    json!({
        "req_seq_id": seq_no,
        "huifu_id": HUIFU_MCH_ID,
        "trans_amt": amount.round2().to_string(),
        "trans_stat": stat,
        "resp_desc": if stat == "F" { "declined" } else { "ok" },
    })
    .to_string()
}

/// A ZhiXinHua asynchronous notification. `status` is one of `SUCCESS`, `FAILED` or `PENDING`.
pub fn zhixinhua_notification(seq_no: &str, amount: Money, status: &str) -> String {
    json!({
        "out_trade_no": seq_no,
        "merchant_no": ZXH_MERCHANT_NO,
        "status": status,
        "amount": amount.round2().to_string(),
        "member": {"id": 501, "level": "gold"},
    })
    .to_string()
}

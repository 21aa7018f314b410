//! Wiring. [`PosEngine`] assembles the database, lock manager, notifiers, providers and services into a ready-to-use
//! [`OrderApi`] and [`PaymentDomainService`].
use std::sync::Arc;

use log::*;
use thiserror::Error;

use crate::{
    api::{OrderApi, OrderDomainService, PaymentDomainService},
    config::{EngineConfig, LockStoreKind},
    db::sqlite::{SqliteDatabase, SqliteDatabaseError},
    events::{
        handlers::{AuditLogHandler, FinanceLogHandler, OrderPaidTrigger, StreamHandler, TableHandler, TABLE_EVENTS},
        EventHandler,
        OrderEvent,
        OrderNotifier,
        PaymentEvent,
        PaymentNotifier,
        SqliteStreamPublisher,
        StreamPublisher,
        ALL_ORDER_EVENTS,
        ORDER_PAID,
        PAYMENT_SUCCESS,
    },
    lock::{LockManager, LockOptions, MemoryLockStore, SqliteLockStore},
    providers::{ProviderError, ProviderRegistry},
    sequence::SequenceGenerator,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Could not set up the database. {0}")]
    Database(#[from] SqliteDatabaseError),
    #[error("Could not set up payment providers. {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Clone)]
pub struct PosEngine {
    db: SqliteDatabase,
    locks: LockManager,
    orders: Arc<OrderDomainService>,
    payments: Arc<PaymentDomainService>,
    api: Arc<OrderApi>,
}

impl PosEngine {
    /// Connects to the configured database, brings its schema up to date and builds the engine.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await?;
        db.migrate().await?;
        let locks = match config.lock_store {
            LockStoreKind::Memory => LockManager::new(Arc::new(MemoryLockStore::default()), config.lock),
            LockStoreKind::Sqlite => LockManager::new(Arc::new(SqliteLockStore::new(db.pool().clone())), config.lock),
        };
        let providers = config.providers.build_registry(config.callback_retry)?;
        let engine = PosEngineBuilder::new(db)
            .with_locks(locks)
            .with_sequences(SequenceGenerator::new(config.order_prefix.as_str(), config.payment_prefix.as_str()))
            .with_providers(providers)
            .build();
        Ok(engine)
    }

    pub fn api(&self) -> Arc<OrderApi> {
        Arc::clone(&self.api)
    }

    pub fn orders(&self) -> Arc<OrderDomainService> {
        Arc::clone(&self.orders)
    }

    pub fn payments(&self) -> Arc<PaymentDomainService> {
        Arc::clone(&self.payments)
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.db
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }
}

/// Assembles a [`PosEngine`].
///
/// Order event handlers are registered in this order: audit log (every order event), table occupancy (create, turn
/// table, cancel, finish), finance log (paid), stream publisher (every order event), then any extra handlers. The
/// order-paid trigger is the first `payment.success` handler.
pub struct PosEngineBuilder {
    db: SqliteDatabase,
    locks: Option<LockManager>,
    sequences: SequenceGenerator,
    providers: ProviderRegistry,
    stream: Option<Arc<dyn StreamPublisher>>,
    order_handlers: Vec<(&'static str, Arc<dyn EventHandler<OrderEvent>>)>,
    payment_handlers: Vec<(&'static str, Arc<dyn EventHandler<PaymentEvent>>)>,
}

impl PosEngineBuilder {
    pub fn new(db: SqliteDatabase) -> Self {
        Self {
            db,
            locks: None,
            sequences: SequenceGenerator::default(),
            providers: ProviderRegistry::new(),
            stream: None,
            order_handlers: Vec::new(),
            payment_handlers: Vec::new(),
        }
    }

    pub fn with_locks(mut self, locks: LockManager) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_sequences(mut self, sequences: SequenceGenerator) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_stream_publisher(mut self, publisher: Arc<dyn StreamPublisher>) -> Self {
        self.stream = Some(publisher);
        self
    }

    pub fn with_order_handler(mut self, event_name: &'static str, handler: Arc<dyn EventHandler<OrderEvent>>) -> Self {
        self.order_handlers.push((event_name, handler));
        self
    }

    pub fn with_payment_handler(
        mut self,
        event_name: &'static str,
        handler: Arc<dyn EventHandler<PaymentEvent>>,
    ) -> Self {
        self.payment_handlers.push((event_name, handler));
        self
    }

    pub fn build(self) -> PosEngine {
        let db = self.db;
        let locks = self
            .locks
            .unwrap_or_else(|| LockManager::new(Arc::new(SqliteLockStore::new(db.pool().clone())), LockOptions::default()));
        let stream = self.stream.unwrap_or_else(|| Arc::new(SqliteStreamPublisher::new(db.pool().clone())));

        let mut order_notifier = OrderNotifier::new();
        order_notifier
            .register_all(&ALL_ORDER_EVENTS, Arc::new(AuditLogHandler))
            .register_all(&TABLE_EVENTS, Arc::new(TableHandler))
            .register(ORDER_PAID, Arc::new(FinanceLogHandler))
            .register_all(&ALL_ORDER_EVENTS, Arc::new(StreamHandler::new(stream)));
        for (event_name, handler) in self.order_handlers {
            order_notifier.register(event_name, handler);
        }
        let order_notifier = Arc::new(order_notifier);
        let orders = Arc::new(OrderDomainService::new(db.clone(), locks.clone(), Arc::clone(&order_notifier)));

        let mut payment_notifier = PaymentNotifier::new();
        payment_notifier.register(PAYMENT_SUCCESS, Arc::new(OrderPaidTrigger::new(Arc::clone(&orders))));
        for (event_name, handler) in self.payment_handlers {
            payment_notifier.register(event_name, handler);
        }
        let payments = Arc::new(PaymentDomainService::new(
            db.clone(),
            locks.clone(),
            self.sequences.clone(),
            Arc::new(self.providers),
            Arc::new(payment_notifier),
        ));

        let api = Arc::new(OrderApi::new(
            db.clone(),
            locks.clone(),
            self.sequences,
            Arc::clone(&orders),
            Arc::clone(&payments),
            order_notifier,
        ));
        info!("🚀️ Engine ready with payment providers {:?}", payments.providers().kinds());
        PosEngine { db, locks, orders, payments, api }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::ProviderConfig,
        events::{HandlerFuture, NullStreamPublisher, ORDER_CREATE, ORDER_FINISH},
        Session,
        test_utils::prepare_env::{prepare_test_db, random_db_path},
    };

    struct Extra;

    impl EventHandler<OrderEvent> for Extra {
        fn name(&self) -> &'static str {
            "extra"
        }

        fn handle<'a>(
            &'a self,
            _event_name: &'a str,
            _session: &'a mut Session,
            _event: &'a OrderEvent,
        ) -> HandlerFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let db = prepare_test_db().await;
        let engine = PosEngineBuilder::new(db)
            .with_stream_publisher(Arc::new(NullStreamPublisher))
            .with_order_handler(ORDER_CREATE, Arc::new(Extra))
            .build();
        let orders = engine.orders();
        let notifier = orders.notifier();
        assert_eq!(notifier.handler_names(ORDER_CREATE), vec!["audit_log", "table", "stream", "extra"]);
        assert_eq!(notifier.handler_names(ORDER_PAID), vec!["audit_log", "finance_log", "stream"]);
        assert_eq!(notifier.handler_names(ORDER_FINISH), vec!["audit_log", "table", "stream"]);
    }

    #[tokio::test]
    async fn engine_from_config() {
        let _ = env_logger::try_init();
        let config = EngineConfig {
            database_url: random_db_path(),
            lock_store: LockStoreKind::Memory,
            providers: ProviderConfig { sandbox: true, ..ProviderConfig::default() },
            ..EngineConfig::default()
        };
        let engine = PosEngine::from_config(&config).await.expect("Error building engine");
        assert!(engine.payments().providers().is_empty());
        let tables = engine.db().fetch_tables_for_store(1).await.unwrap();
        assert!(tables.is_empty());
    }
}

use std::{collections::HashMap, sync::Arc};

use log::*;

use crate::{
    db_types::ProviderKind,
    providers::{PaymentCallbackProvider, PaymentProvider, ProviderError},
};

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    payments: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    callbacks: HashMap<ProviderKind, Arc<dyn PaymentCallbackProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway for both initiating payments and interpreting its callbacks. A later registration for the
    /// same provider replaces the earlier one.
    pub fn register<P>(&mut self, provider: P) -> &mut Self
    where P: PaymentProvider + PaymentCallbackProvider + 'static {
        let kind = PaymentProvider::provider(&provider);
        let provider = Arc::new(provider);
        info!("💳️ Registered payment provider {kind} (merchant {})", provider.mch_id());
        self.payments.insert(kind, provider.clone());
        self.callbacks.insert(kind, provider);
        self
    }

    pub fn payment_provider(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, ProviderError> {
        self.payments.get(&kind).cloned().ok_or(ProviderError::Unsupported(kind))
    }

    pub fn callback_provider(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentCallbackProvider>, ProviderError> {
        self.callbacks.get(&kind).cloned().ok_or(ProviderError::Unsupported(kind))
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.payments.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}

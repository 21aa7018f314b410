use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;

use crate::{
    api::{
        errors::PaymentError,
        payment_objects::{CallbackJob, CallbackResult, PaymentRequest},
    },
    db::sqlite::{
        callbacks,
        payments::{self, PaymentStateUpdate},
        SqliteDatabase,
    },
    db_types::{NewPayment, Payment, PaymentState, ProviderKind},
    events::{PaymentEvent, PaymentNotifier, PAYMENT_SUCCESS},
    lock::{keys, LockManager},
    operator::Operator,
    providers::{PaymentProvider, ProviderRegistry, RetryPolicy},
    sequence::SequenceGenerator,
};

/// `PaymentDomainService` starts payments with third-party providers and reconciles their asynchronous callbacks.
///
/// Callback processing is idempotent. Three things make it so:
/// 1. Every callback for a payment runs under the `payment:<seq_no>` lock.
/// 2. The stored callback row is deleted in the same transaction that applies it. A redelivered job finds no row.
/// 3. A payment with `finished_at` set is never updated again.
pub struct PaymentDomainService {
    db: SqliteDatabase,
    locks: LockManager,
    sequences: SequenceGenerator,
    providers: Arc<ProviderRegistry>,
    notifier: Arc<PaymentNotifier>,
}

impl Debug for PaymentDomainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentDomainService ({:?})", self.providers.kinds())
    }
}

enum Reconciled {
    Done(CallbackResult),
    NotVisible(RetryPolicy),
}

impl PaymentDomainService {
    pub fn new(
        db: SqliteDatabase,
        locks: LockManager,
        sequences: SequenceGenerator,
        providers: Arc<ProviderRegistry>,
        notifier: Arc<PaymentNotifier>,
    ) -> Self {
        Self { db, locks, sequences, providers, notifier }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Starts a payment with the requested provider and records it as `Processing`.
    ///
    /// A new sequence number is drawn first. The provider call and the insert run under the payment lock, which is
    /// released whether or not the provider accepted the payment. Nothing is stored for a payment the provider
    /// refused.
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<Payment, PaymentError> {
        let provider = self.providers.payment_provider(request.provider)?;
        let seq_no = {
            let mut session = self.db.session().await?;
            let seq_no = self.sequences.next_payment_seq(session.conn()).await?;
            session.commit().await?;
            seq_no
        };
        let guard = self.locks.acquire(keys::payment(&seq_no)).await?;
        let result = self.initiate(provider.as_ref(), &seq_no, request).await;
        guard.release().await;
        result
    }

    async fn initiate(
        &self,
        provider: &dyn PaymentProvider,
        seq_no: &str,
        request: PaymentRequest,
    ) -> Result<Payment, PaymentError> {
        debug!("💳️ Requesting {} from {} for payment {seq_no}", request.params.amount, request.provider);
        let result = provider.payment(seq_no, &request.params).await.map_err(|e| {
            warn!("💳️ {} did not accept payment {seq_no}: {e}", request.provider);
            e
        })?;
        let new_payment = NewPayment {
            seq_no: seq_no.to_string(),
            provider: request.provider,
            channel: result.channel,
            amount: request.params.amount,
            business_type: request.business_type,
            business_id: request.business_id,
            mch_id: provider.mch_id().to_string(),
            request: result.request,
            response: result.response,
        };
        let mut session = self.db.begin().await?;
        let payment = payments::insert_payment(new_payment, session.conn()).await?;
        session.commit().await?;
        info!("💳️ Payment {seq_no} of {} via {} is processing", payment.amount, payment.channel);
        Ok(payment)
    }

    /// Stores an inbound notification and returns the job that will reconcile it. The caller enqueues the job.
    pub async fn receive_callback(&self, provider: ProviderKind, payload: &str) -> Result<CallbackJob, PaymentError> {
        let interpreter = self.providers.callback_provider(provider)?;
        let seq_no = interpreter.seq_no(payload)?;
        let mut session = self.db.session().await?;
        let callback_id = callbacks::insert_callback(&seq_no, provider, payload, session.conn()).await?;
        session.commit().await?;
        Ok(CallbackJob { callback_id, seq_no })
    }

    /// Jobs for the callbacks that were stored but never reconciled, e.g. because the process stopped before the
    /// queue drained. The worker re-enqueues these at startup.
    pub async fn pending_jobs(&self) -> Result<Vec<CallbackJob>, PaymentError> {
        let mut session = self.db.session().await?;
        let callbacks = callbacks::pending_callbacks(session.conn()).await?;
        session.commit().await?;
        Ok(callbacks.into_iter().map(|c| CallbackJob { callback_id: c.id, seq_no: c.seq_no }).collect())
    }

    /// Reconciles one stored callback with its payment. Safe to run any number of times for the same job.
    ///
    /// Under the payment lock and in one transaction: the callback row is loaded and deleted, the payment is loaded,
    /// the provider interprets the notification, the payment is updated and, on success only, `payment.success` is
    /// fired so that the order is paid. Errors roll everything back, including the deletion, so the job can be
    /// retried.
    pub async fn process_payment_callback(&self, job: &CallbackJob) -> Result<CallbackResult, PaymentError> {
        let guard = self.locks.acquire(keys::payment(&job.seq_no)).await?;
        let result = self.reconcile(job).await;
        guard.release().await;
        result
    }

    async fn reconcile(&self, job: &CallbackJob) -> Result<CallbackResult, PaymentError> {
        let mut attempt = 0;
        loop {
            match self.reconcile_once(job).await? {
                Reconciled::Done(result) => return Ok(result),
                Reconciled::NotVisible(policy) if attempt < policy.attempts => {
                    attempt += 1;
                    debug!("💳️ Payment {} is not visible yet. Retry {attempt}/{}", job.seq_no, policy.attempts);
                    tokio::time::sleep(policy.delay).await;
                },
                Reconciled::NotVisible(_) => {
                    warn!("💳️ Payment {} never became visible for {job}", job.seq_no);
                    return Err(PaymentError::PaymentNotFound(job.seq_no.clone()));
                },
            }
        }
    }

    async fn reconcile_once(&self, job: &CallbackJob) -> Result<Reconciled, PaymentError> {
        let mut session = self.db.begin().await?;
        let Some(callback) = callbacks::fetch_callback(job.callback_id, session.conn()).await? else {
            debug!("💳️ {job} was already handled");
            return Ok(Reconciled::Done(CallbackResult::AlreadyHandled));
        };
        callbacks::delete_callback(callback.id, session.conn()).await?;
        let interpreter = self.providers.callback_provider(callback.provider)?;
        let Some(payment) = payments::fetch_payment(&callback.seq_no, session.conn()).await? else {
            if let Some(policy) = interpreter.visibility_retry() {
                session.rollback().await?;
                return Ok(Reconciled::NotVisible(policy));
            }
            debug!("💳️ {job} refers to an unknown payment. Discarding it");
            session.commit().await?;
            return Ok(Reconciled::Done(CallbackResult::PaymentMissing));
        };
        if payment.finished_at.is_some() {
            debug!("💳️ Payment {} already finished as {}. Discarding {job}", payment.seq_no, payment.state);
            session.commit().await?;
            return Ok(Reconciled::Done(CallbackResult::AlreadyFinished(payment)));
        }
        let outcome = interpreter.callback(&callback, &payment).await?;
        if !payment.state.can_transition_to(outcome.state) {
            return Err(PaymentError::InvalidTransition {
                seq_no: payment.seq_no,
                from: payment.state.to_string(),
                to: outcome.state.to_string(),
            });
        }
        let update = PaymentStateUpdate {
            state: outcome.state,
            callback_payload: Some(callback.payload.clone()),
            fail_reason: outcome.fail_reason,
            member_info: outcome.member_info,
            finished_at: outcome.state.is_finished().then(Utc::now),
        };
        let updated = payments::update_payment_state(&payment.seq_no, update, session.conn())
            .await?
            .ok_or_else(|| PaymentError::AlreadyFinished(payment.seq_no.clone()))?;
        if updated.state == PaymentState::Success {
            let event = PaymentEvent::new(updated.clone(), Operator::System);
            self.notifier.fire(PAYMENT_SUCCESS, &mut session, &event).await?;
        }
        session.commit().await?;
        info!("💳️ Payment {} is now {} after {job}", updated.seq_no, updated.state);
        Ok(Reconciled::Done(CallbackResult::Applied(updated)))
    }

    /// Abandons a payment that never reached a terminal state, e.g. because the customer walked away from the
    /// terminal. The payment becomes a `Failure`, which lifts the in-flight guard on its order.
    pub async fn close_payment(&self, seq_no: &str, reason: &str) -> Result<Payment, PaymentError> {
        let guard = self.locks.acquire(keys::payment(seq_no)).await?;
        let result = self.close_locked(seq_no, reason).await;
        guard.release().await;
        result
    }

    async fn close_locked(&self, seq_no: &str, reason: &str) -> Result<Payment, PaymentError> {
        let mut session = self.db.begin().await?;
        let payment = payments::fetch_payment(seq_no, session.conn())
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(seq_no.to_string()))?;
        if payment.finished_at.is_some() {
            return Err(PaymentError::AlreadyFinished(seq_no.to_string()));
        }
        let update = PaymentStateUpdate {
            state: PaymentState::Failure,
            callback_payload: None,
            fail_reason: Some(reason.to_string()),
            member_info: None,
            finished_at: Some(Utc::now()),
        };
        let closed = payments::update_payment_state(seq_no, update, session.conn())
            .await?
            .ok_or_else(|| PaymentError::AlreadyFinished(seq_no.to_string()))?;
        session.commit().await?;
        info!("💳️ Payment {seq_no} closed: {reason}");
        Ok(closed)
    }
}

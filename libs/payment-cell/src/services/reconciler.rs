// libs/payment-cell/src/services/reconciler.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use appointment_cell::models::Appointment;
use shared_database::{DocumentStore, DocumentStoreExt, Transaction};

use crate::models::{
    CompletedTransaction, Payment, PaymentError, PaymentEvent, PaymentStatus, ReconcileOutcome,
    PADDLE_PROVIDER,
};

/// Applies verified payment events to the appointment and payment ledger
/// exactly once, however often the processor redelivers them.
pub struct PaymentReconciler {
    store: Arc<dyn DocumentStore>,
    provider: String,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            provider: PADDLE_PROVIDER.to_string(),
        }
    }

    pub async fn reconcile(&self, event: &PaymentEvent) -> Result<ReconcileOutcome, PaymentError> {
        match event {
            PaymentEvent::TransactionCompleted(transaction) => self.apply_completed(transaction).await,
            PaymentEvent::Unhandled(event_type) => {
                debug!("Acknowledging unhandled payment event {}", event_type);
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// The existence checks and the writes run inside one store transaction;
    /// isolation keeps two deliveries of the same transaction id from both
    /// passing the "no payment yet" check.
    pub async fn apply_completed(
        &self,
        transaction: &CompletedTransaction,
    ) -> Result<ReconcileOutcome, PaymentError> {
        let (Some(transaction_id), Some(appointment_id)) =
            (transaction.transaction_id.as_deref(), transaction.appointment_id.as_deref())
        else {
            warn!(
                "transaction.completed without transaction/appointment id (txn={:?}, apt={:?}), ignoring",
                transaction.transaction_id, transaction.appointment_id
            );
            return Ok(ReconcileOutcome::Ignored);
        };

        let provider = self.provider.as_str();
        let outcome = self
            .store
            .run_in_transaction(|tx: &mut dyn Transaction| {
                record_payment(tx, transaction, transaction_id, appointment_id, provider)
            })
            .await?;

        match &outcome {
            ReconcileOutcome::Applied => {
                info!("Payment {} applied to appointment {}", transaction_id, appointment_id)
            }
            ReconcileOutcome::AlreadyApplied => {
                info!("Payment {} already recorded, redelivery ignored", transaction_id)
            }
            ReconcileOutcome::AlreadyPaid { existing_transaction_id } => warn!(
                "Appointment {} already paid under {:?}, payment {} not applied",
                appointment_id, existing_transaction_id, transaction_id
            ),
            ReconcileOutcome::Ignored => {}
        }

        Ok(outcome)
    }
}

fn record_payment(
    tx: &mut dyn Transaction,
    transaction: &CompletedTransaction,
    transaction_id: &str,
    appointment_id: &str,
    provider: &str,
) -> Result<ReconcileOutcome, PaymentError> {
    let appointment_key = Appointment::key(appointment_id);
    let payment_key = Payment::key(transaction_id);

    let appointment: Appointment = match tx.get(&appointment_key)? {
        Some(document) => serde_json::from_value(document)?,
        None => return Err(PaymentError::AppointmentNotFound(appointment_id.to_string())),
    };

    if tx.get(&payment_key)?.is_some() {
        return Ok(ReconcileOutcome::AlreadyApplied);
    }

    if appointment.is_paid && appointment.transaction_id.as_deref() != Some(transaction_id) {
        return Ok(ReconcileOutcome::AlreadyPaid {
            existing_transaction_id: appointment.transaction_id,
        });
    }

    let now = Utc::now();
    let payment = Payment {
        id: transaction_id.to_string(),
        appointment_id: appointment_id.to_string(),
        status: PaymentStatus::Completed,
        provider: provider.to_string(),
        amount: transaction.amount.clone(),
        currency: transaction.currency.clone(),
        created_at: now,
    };

    tx.create(&payment_key, serde_json::to_value(&payment)?);
    tx.merge(
        &appointment_key,
        json!({
            "is_paid": true,
            "transaction_id": transaction_id,
            "payment_status": "paid",
            "payment_provider": provider,
            "paid_at": now,
            "updated_at": now,
        }),
    );

    Ok(ReconcileOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::{InMemoryDocumentStore, StoreError};
    use shared_utils::test_utils::MockDocuments;

    async fn store_with_appointment(id: &str) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .set(&Appointment::key(id), MockDocuments::appointment(id, "patient-1", "doctor-1", "pending"))
            .await
            .unwrap();
        store
    }

    fn completed(transaction_id: &str, appointment_id: &str) -> PaymentEvent {
        PaymentEvent::TransactionCompleted(CompletedTransaction {
            transaction_id: Some(transaction_id.to_string()),
            appointment_id: Some(appointment_id.to_string()),
            amount: Some("4500".to_string()),
            currency: Some("EUR".to_string()),
        })
    }

    async fn appointment(store: &InMemoryDocumentStore, id: &str) -> Appointment {
        store.get_as(&Appointment::key(id)).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_first_delivery_records_payment_and_marks_paid() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = PaymentReconciler::new(store.clone());

        let outcome = reconciler.reconcile(&completed("txn_1", "apt_1")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Applied);
        let apt = appointment(&store, "apt_1").await;
        assert!(apt.is_paid);
        assert_eq!(apt.transaction_id.as_deref(), Some("txn_1"));
        assert_eq!(apt.payment_status.as_deref(), Some("paid"));
        assert_eq!(apt.payment_provider.as_deref(), Some(PADDLE_PROVIDER));

        let payment: Payment = store.get_as(&Payment::key("txn_1")).await.unwrap().unwrap();
        assert_eq!(payment.appointment_id, "apt_1");
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.amount.as_deref(), Some("4500"));
    }

    #[tokio::test]
    async fn test_redelivery_changes_nothing() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = PaymentReconciler::new(store.clone());
        reconciler.reconcile(&completed("txn_1", "apt_1")).await.unwrap();
        let after_first = appointment(&store, "apt_1").await;

        let outcome = reconciler.reconcile(&completed("txn_1", "apt_1")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
        assert_eq!(appointment(&store, "apt_1").await, after_first);
        assert_eq!(store.count("payments").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_apply_exactly_once() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = Arc::new(PaymentReconciler::new(store.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let reconciler = reconciler.clone();
                tokio::spawn(async move { reconciler.reconcile(&completed("txn_1", "apt_1")).await })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ReconcileOutcome::Applied => applied += 1,
                ReconcileOutcome::AlreadyApplied => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(store.count("payments").await, 1);
        assert!(appointment(&store, "apt_1").await.is_paid);
    }

    #[tokio::test]
    async fn test_second_transaction_for_paid_appointment_is_not_applied() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = PaymentReconciler::new(store.clone());
        reconciler.reconcile(&completed("txn_1", "apt_1")).await.unwrap();

        let outcome = reconciler.reconcile(&completed("txn_2", "apt_1")).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::AlreadyPaid { existing_transaction_id: Some("txn_1".to_string()) }
        );
        assert!(store.get(&Payment::key("txn_2")).await.unwrap().is_none());
        assert_eq!(appointment(&store, "apt_1").await.transaction_id.as_deref(), Some("txn_1"));
    }

    #[tokio::test]
    async fn test_missing_appointment_is_a_hard_failure() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let reconciler = PaymentReconciler::new(store.clone());

        let result = reconciler.reconcile(&completed("txn_1", "apt_missing")).await;

        assert_matches!(result, Err(PaymentError::AppointmentNotFound(id)) if id == "apt_missing");
        assert_eq!(store.count("payments").await, 0);
    }

    #[tokio::test]
    async fn test_events_without_ids_are_ignored() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = PaymentReconciler::new(store.clone());
        let event = PaymentEvent::TransactionCompleted(CompletedTransaction {
            transaction_id: Some("txn_1".to_string()),
            ..Default::default()
        });

        assert_eq!(reconciler.reconcile(&event).await.unwrap(), ReconcileOutcome::Ignored);
        assert_eq!(
            reconciler.reconcile(&PaymentEvent::Unhandled("transaction.created".to_string())).await.unwrap(),
            ReconcileOutcome::Ignored
        );
        assert_eq!(store.count("payments").await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_without_writes() {
        let store = store_with_appointment("apt_1").await;
        let reconciler = PaymentReconciler::new(store.clone());
        store.set_unavailable(true);

        let result = reconciler.reconcile(&completed("txn_1", "apt_1")).await;

        assert_matches!(result, Err(PaymentError::Store(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(!appointment(&store, "apt_1").await.is_paid);
    }
}

/// Subscription state machine
///
/// ```text
///            confirmed payment
///   free  ───────────────────▶  premium
///         ◀───────────────────
///             cancellation
/// ```
///
/// `premium+` is never reached through a payment; a `premium+` account keeps its tier
/// when a payment is confirmed and drops to `free` on cancellation.
///
/// Confirmation is idempotent by the processor's transaction id: the payment row and the
/// tier change commit together, and the unique constraint on `payments.transaction_id`
/// rejects a second confirmation of the same id.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::payment::{self, CreatePayment, Payment, PaymentStatus};
use crate::models::user::{SubscriptionTier, User};

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Payment {0} was already processed")]
    AlreadyProcessed(String),

    #[error("Subscription is already free")]
    AlreadyFree,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Event driving a tier change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    PaymentConfirmed,
    Cancelled,
}

/// Tier reached from `from` on `event`
pub fn transition(
    from: SubscriptionTier,
    event: SubscriptionEvent,
) -> Result<SubscriptionTier, SubscriptionError> {
    match (from, event) {
        (SubscriptionTier::PremiumPlus, SubscriptionEvent::PaymentConfirmed) => {
            Ok(SubscriptionTier::PremiumPlus)
        }
        (_, SubscriptionEvent::PaymentConfirmed) => Ok(SubscriptionTier::Premium),
        (SubscriptionTier::Free, SubscriptionEvent::Cancelled) => Err(SubscriptionError::AlreadyFree),
        (_, SubscriptionEvent::Cancelled) => Ok(SubscriptionTier::Free),
    }
}

/// A payment the processor reports as succeeded
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub provider: String,
}

/// Records a completed payment and upgrades the user in one transaction
///
/// The AI question counter resets to zero as part of the upgrade.
///
/// # Errors
///
/// `SubscriptionError::AlreadyProcessed` when the transaction id is already recorded,
/// whether detected up front or by the unique constraint under a concurrent confirmation.
pub async fn confirm_payment(
    pool: &PgPool,
    user_id: Uuid,
    confirmed: ConfirmedPayment,
) -> Result<(User, Payment), SubscriptionError> {
    let mut tx = pool.begin().await?;

    let user = User::lock_for_update(&mut tx, user_id)
        .await?
        .ok_or(SubscriptionError::UserNotFound(user_id))?;

    if Payment::find_by_transaction_id(&mut *tx, &confirmed.transaction_id)
        .await?
        .is_some()
    {
        return Err(SubscriptionError::AlreadyProcessed(confirmed.transaction_id));
    }

    let tier = transition(user.tier(), SubscriptionEvent::PaymentConfirmed)?;

    let payment = Payment::create(
        &mut *tx,
        CreatePayment {
            user_id,
            transaction_id: confirmed.transaction_id.clone(),
            amount: confirmed.amount,
            currency: confirmed.currency,
            subscription_type: SubscriptionTier::Premium,
            status: PaymentStatus::Completed,
            payment_method: confirmed.payment_method,
            payment_provider: confirmed.provider,
        },
    )
    .await
    .map_err(|e| {
        if payment::is_duplicate_transaction(&e) {
            SubscriptionError::AlreadyProcessed(confirmed.transaction_id.clone())
        } else {
            SubscriptionError::Database(e)
        }
    })?;

    let user = User::set_subscription(&mut *tx, user_id, tier, true)
        .await?
        .ok_or(SubscriptionError::UserNotFound(user_id))?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        transaction_id = %payment.transaction_id,
        tier = %tier,
        "Payment confirmed, subscription upgraded"
    );

    Ok((user, payment))
}

/// Downgrades a paid subscription to free; the AI question counter is left as is
pub async fn cancel(pool: &PgPool, user_id: Uuid) -> Result<User, SubscriptionError> {
    let mut tx = pool.begin().await?;

    let user = User::lock_for_update(&mut tx, user_id)
        .await?
        .ok_or(SubscriptionError::UserNotFound(user_id))?;

    let tier = transition(user.tier(), SubscriptionEvent::Cancelled)?;

    let user = User::set_subscription(&mut *tx, user_id, tier, false)
        .await?
        .ok_or(SubscriptionError::UserNotFound(user_id))?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "Subscription cancelled");

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_upgrades_to_premium() {
        let tier = transition(SubscriptionTier::Free, SubscriptionEvent::PaymentConfirmed).unwrap();
        assert_eq!(tier, SubscriptionTier::Premium);
    }

    #[test]
    fn test_payment_never_reaches_premium_plus() {
        let tier =
            transition(SubscriptionTier::Premium, SubscriptionEvent::PaymentConfirmed).unwrap();
        assert_eq!(tier, SubscriptionTier::Premium);

        let tier =
            transition(SubscriptionTier::PremiumPlus, SubscriptionEvent::PaymentConfirmed).unwrap();
        assert_eq!(tier, SubscriptionTier::PremiumPlus);
    }

    #[test]
    fn test_cancel_downgrades_to_free() {
        let tier = transition(SubscriptionTier::Premium, SubscriptionEvent::Cancelled).unwrap();
        assert_eq!(tier, SubscriptionTier::Free);
    }

    #[test]
    fn test_cancel_when_free_is_rejected() {
        let result = transition(SubscriptionTier::Free, SubscriptionEvent::Cancelled);
        assert!(matches!(result, Err(SubscriptionError::AlreadyFree)));
    }
}

//! Best-effort notification dispatch.
//!
//! Every delivery attempt is written to the email log. Order notices run in a
//! spawned task after the order transaction commits; failures are logged and
//! never reach the buyer's request. There are no retries.

use sqlx::PgPool;
use tracing::Instrument;

use ticket_booth_core::notification::{admin_notification, order_confirmation, payment_verified};
use ticket_booth_core::{
    CurrencyCode, Email, EmailStatus, NotificationError, Order, OutgoingEmail,
};

use crate::db::{EmailLogRepository, NewEmailLog};
use crate::services::email::{EmailClient, EmailError};

/// Send `email` and record the attempt.
///
/// # Errors
///
/// Returns the provider error when sending fails; the failure is still logged.
pub async fn send_and_record(
    pool: &PgPool,
    client: &EmailClient,
    email: &OutgoingEmail,
) -> Result<String, EmailError> {
    let result = client.send(email).await;

    let (status, provider_id, error) = match &result {
        Ok(id) => (EmailStatus::Sent, Some(id.clone()), None),
        Err(e) => (EmailStatus::Failed, None, Some(e.to_string())),
    };
    let log = NewEmailLog {
        order_reference: email.order_reference.clone(),
        email_type: email.email_type.as_str().to_owned(),
        recipients: email.to.iter().map(|to| to.as_str().to_owned()).collect(),
        subject: email.subject.clone(),
        status,
        provider_id,
        error,
    };
    if let Err(e) = EmailLogRepository::new(pool).record(&log).await {
        tracing::warn!(error = %e, "Failed to record email log");
    }

    result
}

async fn send_logged(pool: &PgPool, client: &EmailClient, email: OutgoingEmail) {
    if let Err(e) = send_and_record(pool, client, &email).await {
        tracing::warn!(
            error = %e,
            email_type = %email.email_type,
            order = email.order_reference.as_deref().unwrap_or("-"),
            "Notification email failed"
        );
    }
}

/// Messages sent when an order is completed.
///
/// # Errors
///
/// Returns `NotificationError::Template` if a body fails to render.
pub fn order_completed_emails(
    order: &Order,
    admin: Option<&Email>,
    currency: CurrencyCode,
) -> Result<Vec<OutgoingEmail>, NotificationError> {
    let mut emails = vec![order_confirmation(order, currency)?];
    if let Some(admin) = admin {
        emails.push(admin_notification(order, admin.clone(), currency)?);
    }
    Ok(emails)
}

/// Send the buyer confirmation and admin notice in the background.
pub fn spawn_order_completed(pool: PgPool, client: Option<EmailClient>, order: Order) {
    let Some(client) = client else {
        tracing::debug!(order = %order.reference, "Email not configured; skipping notifications");
        return;
    };
    let span = tracing::info_span!("order_completed_notifications", order = %order.reference);
    tokio::spawn(
        async move {
            let emails = match order_completed_emails(
                &order,
                client.admin_notification_email(),
                CurrencyCode::default(),
            ) {
                Ok(emails) => emails,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to render order emails");
                    return;
                }
            };
            for email in emails {
                send_logged(&pool, &client, email).await;
            }
        }
        .instrument(span),
    );
}

/// Tell the buyer their payment was verified, in the background.
pub fn spawn_payment_verified(pool: PgPool, client: Option<EmailClient>, order: Order) {
    let Some(client) = client else {
        return;
    };
    let span = tracing::info_span!("payment_verified_notification", order = %order.reference);
    tokio::spawn(
        async move {
            match payment_verified(&order, CurrencyCode::default()) {
                Ok(email) => send_logged(&pool, &client, email).await,
                Err(e) => tracing::error!(error = %e, "Failed to render payment email"),
            }
        }
        .instrument(span),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use ticket_booth_core::{CartId, EmailType, OrderId, PaymentMethod, PaymentStatus};
    use uuid::Uuid;

    fn completed_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            reference: Uuid::new_v4(),
            cart_id: CartId::new(3),
            customer_email: Email::parse("buyer@example.com").unwrap(),
            customer_phone: "555-0100".to_string(),
            items: Vec::new(),
            subtotal: Decimal::new(5000, 2),
            total: Decimal::new(5000, 2),
            payment_method: PaymentMethod::Zelle,
            payment_email: None,
            payment_phone: Some("555-0100".to_string()),
            payment_status: PaymentStatus::Completed,
            payment_confirmation: Some("ZELLE-1".to_string()),
            payment_verified: false,
            verified_at: None,
            created_at: now,
            completed_at: Some(now),
        }
    }

    #[test]
    fn test_buyer_confirmation_only_without_admin() {
        let order = completed_order();
        let emails = order_completed_emails(&order, None, CurrencyCode::default()).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email_type, EmailType::OrderConfirmation);
        assert_eq!(emails[0].to[0].as_str(), "buyer@example.com");
    }

    #[test]
    fn test_admin_notice_added_when_configured() {
        let order = completed_order();
        let admin = Email::parse("boxoffice@example.com").unwrap();
        let emails =
            order_completed_emails(&order, Some(&admin), CurrencyCode::default()).unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[1].email_type, EmailType::AdminNotification);
        assert_eq!(emails[1].to[0].as_str(), "boxoffice@example.com");
        let reference = order.reference.to_string();
        assert!(emails.iter().all(|e| e.order_reference.as_deref() == Some(reference.as_str())));
    }
}

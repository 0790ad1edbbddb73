//! Outgoing email composition.
//!
//! Builds the messages the storefront hands to its email provider: order
//! confirmations and admin notices composed from an [`Order`], and ad-hoc
//! messages requested through the public send-email endpoint. Delivery lives in
//! the storefront; this module only decides recipients, subject and body.

use askama::Template;
use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::types::{CurrencyCode, Email, EmailError, format_money};

/// Errors raised while composing an email.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// No recipient fields were supplied.
    #[error("at least one recipient is required")]
    NoRecipients,

    /// A supplied recipient is not a valid address.
    #[error("invalid recipient {address}: {source}")]
    InvalidRecipient {
        address: String,
        #[source]
        source: EmailError,
    },

    /// A body template failed to render.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Kind of email being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EmailType {
    #[default]
    OrderConfirmation,
    AttendeeTicket,
    AdminNotification,
    PaymentVerified,
}

impl EmailType {
    /// Wire and storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderConfirmation => "orderConfirmation",
            Self::AttendeeTicket => "attendeeTicket",
            Self::AdminNotification => "adminNotification",
            Self::PaymentVerified => "paymentVerified",
        }
    }

    /// Subject used when the caller does not supply one.
    #[must_use]
    pub fn default_subject(self, order: Option<&str>) -> String {
        let base = match self {
            Self::OrderConfirmation => "Your order confirmation",
            Self::AttendeeTicket => "Your ticket",
            Self::AdminNotification => "New order received",
            Self::PaymentVerified => "Your payment has been verified",
        };
        match order {
            Some(order) => format!("{base} ({order})"),
            None => base.to_string(),
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message ready to hand to the email provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub email_type: EmailType,
    /// Public order reference this email concerns, if any.
    pub order_reference: Option<String>,
    pub to: Vec<Email>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// One recipient or a list, as accepted in the `to` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    fn iter(&self) -> impl Iterator<Item = &str> {
        let (one, many) = match self {
            Self::One(address) => (Some(address.as_str()), &[][..]),
            Self::Many(addresses) => (None, addresses.as_slice()),
        };
        one.into_iter().chain(many.iter().map(String::as_str))
    }
}

/// Body of `POST /api/email/send-email-confirmation`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    #[serde(default)]
    pub to: Option<Recipients>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub attendee_emails: Option<Vec<String>>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_details: serde_json::Value,
    #[serde(default)]
    pub email_type: EmailType,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl EmailRequest {
    /// Resolve recipients and fill in the default subject and body.
    ///
    /// Recipients are the union of `to`, `customerEmail`, `attendeeEmails` and
    /// `adminEmail`, normalized and deduplicated in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::NoRecipients`] or
    /// [`NotificationError::InvalidRecipient`].
    pub fn into_outgoing(self) -> Result<OutgoingEmail, NotificationError> {
        let candidates = self
            .to
            .iter()
            .flat_map(Recipients::iter)
            .chain(self.customer_email.as_deref())
            .chain(self.attendee_emails.iter().flatten().map(String::as_str))
            .chain(self.admin_email.as_deref());
        let to = resolve_recipients(candidates)?;

        let order_reference = self
            .order_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());
        let subject = self
            .subject
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.email_type.default_subject(order_reference.as_deref()));
        let (rows, note) = detail_rows(&self.order_details);
        let text = RequestSummaryText {
            rows: &rows,
            note: &note,
        }
        .render()?;
        let html = match self.html.filter(|h| !h.trim().is_empty()) {
            Some(html) => html,
            None => RequestSummaryHtml {
                subject: &subject,
                rows: &rows,
                note: &note,
            }
            .render()?,
        };

        Ok(OutgoingEmail {
            email_type: self.email_type,
            order_reference,
            to,
            subject,
            html,
            text,
        })
    }
}

/// Parse, normalize and deduplicate recipient addresses. Blank entries are
/// skipped.
///
/// # Errors
///
/// Returns [`NotificationError::InvalidRecipient`] for the first malformed
/// address, or [`NotificationError::NoRecipients`] if nothing is left.
pub fn resolve_recipients<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Email>, NotificationError> {
    let mut recipients: Vec<Email> = Vec::new();
    for candidate in candidates {
        if candidate.trim().is_empty() {
            continue;
        }
        let email =
            Email::parse(candidate).map_err(|source| NotificationError::InvalidRecipient {
                address: candidate.trim().to_owned(),
                source,
            })?;
        if !recipients.contains(&email) {
            recipients.push(email);
        }
    }
    if recipients.is_empty() {
        return Err(NotificationError::NoRecipients);
    }
    Ok(recipients)
}

/// One order line as shown in an email.
struct SummaryLine {
    name: String,
    quantity: u32,
    amount: String,
}

/// Order fields shared by every order email.
struct OrderSummary {
    reference: String,
    customer_email: String,
    payment_method: String,
    confirmation: String,
    lines: Vec<SummaryLine>,
    total: String,
}

impl OrderSummary {
    fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            reference: order.reference.to_string(),
            customer_email: order.customer_email.to_string(),
            payment_method: order.payment_method.to_string(),
            confirmation: order
                .payment_confirmation
                .clone()
                .unwrap_or_else(|| "-".to_owned()),
            lines: order
                .items
                .iter()
                .map(|line| SummaryLine {
                    name: line.name.clone(),
                    quantity: line.quantity,
                    amount: format_money(line.line_total(), currency),
                })
                .collect(),
            total: format_money(order.total, currency),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/admin_notification.html")]
struct AdminNotificationHtml<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/admin_notification.txt")]
struct AdminNotificationText<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/payment_verified.html")]
struct PaymentVerifiedHtml<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

#[derive(Template)]
#[template(path = "email/payment_verified.txt")]
struct PaymentVerifiedText<'a> {
    subject: &'a str,
    order: &'a OrderSummary,
}

/// One `orderDetails` entry of an ad-hoc request.
struct DetailRow {
    key: String,
    value: String,
}

/// HTML body used when a send request carries no `html`.
#[derive(Template)]
#[template(path = "email/request_summary.html")]
struct RequestSummaryHtml<'a> {
    subject: &'a str,
    rows: &'a [DetailRow],
    note: &'a str,
}

#[derive(Template)]
#[template(path = "email/request_summary.txt")]
struct RequestSummaryText<'a> {
    rows: &'a [DetailRow],
    note: &'a str,
}

/// Order confirmation sent to the buyer after completion.
///
/// # Errors
///
/// Returns [`NotificationError::Template`] if a body fails to render.
pub fn order_confirmation(
    order: &Order,
    currency: CurrencyCode,
) -> Result<OutgoingEmail, NotificationError> {
    let summary = OrderSummary::new(order, currency);
    let subject = EmailType::OrderConfirmation.default_subject(Some(summary.reference.as_str()));
    let html = OrderConfirmationHtml {
        subject: &subject,
        order: &summary,
    }
    .render()?;
    let text = OrderConfirmationText {
        subject: &subject,
        order: &summary,
    }
    .render()?;

    Ok(OutgoingEmail {
        email_type: EmailType::OrderConfirmation,
        order_reference: Some(summary.reference),
        to: vec![order.customer_email.clone()],
        subject,
        html,
        text,
    })
}

/// Notice to the store admin that an order was completed.
///
/// # Errors
///
/// Returns [`NotificationError::Template`] if a body fails to render.
pub fn admin_notification(
    order: &Order,
    admin: Email,
    currency: CurrencyCode,
) -> Result<OutgoingEmail, NotificationError> {
    let summary = OrderSummary::new(order, currency);
    let subject = EmailType::AdminNotification.default_subject(Some(summary.reference.as_str()));
    let html = AdminNotificationHtml {
        subject: &subject,
        order: &summary,
    }
    .render()?;
    let text = AdminNotificationText {
        subject: &subject,
        order: &summary,
    }
    .render()?;

    Ok(OutgoingEmail {
        email_type: EmailType::AdminNotification,
        order_reference: Some(summary.reference),
        to: vec![admin],
        subject,
        html,
        text,
    })
}

/// Notice to the buyer that staff verified the payment.
///
/// # Errors
///
/// Returns [`NotificationError::Template`] if a body fails to render.
pub fn payment_verified(
    order: &Order,
    currency: CurrencyCode,
) -> Result<OutgoingEmail, NotificationError> {
    let summary = OrderSummary::new(order, currency);
    let subject = EmailType::PaymentVerified.default_subject(Some(summary.reference.as_str()));
    let html = PaymentVerifiedHtml {
        subject: &subject,
        order: &summary,
    }
    .render()?;
    let text = PaymentVerifiedText {
        subject: &subject,
        order: &summary,
    }
    .render()?;

    Ok(OutgoingEmail {
        email_type: EmailType::PaymentVerified,
        order_reference: Some(summary.reference),
        to: vec![order.customer_email.clone()],
        subject,
        html,
        text,
    })
}

fn detail_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Split `orderDetails` into table rows, or a single note for non-objects.
fn detail_rows(details: &serde_json::Value) -> (Vec<DetailRow>, String) {
    match details {
        serde_json::Value::Object(map) => (
            map.iter()
                .map(|(key, value)| DetailRow {
                    key: key.clone(),
                    value: detail_value(value),
                })
                .collect(),
            String::new(),
        ),
        other => (Vec::new(), detail_value(other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::cart::tests::empty_cart;
    use crate::catalog::tests::ticket;
    use crate::order::tests::placed_order;
    use crate::order::{CheckoutInput, checkout};
    use crate::types::PaymentMethod;

    fn request(body: serde_json::Value) -> EmailRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_recipients_are_union_of_all_fields() {
        let email = request(json!({
            "to": ["a@example.com", "B@example.com"],
            "customerEmail": "b@example.com",
            "attendeeEmails": ["c@example.com", ""],
            "adminEmail": "admin@example.com",
            "emailType": "attendeeTicket",
        }))
        .into_outgoing()
        .unwrap();

        let to: Vec<&str> = email.to.iter().map(Email::as_str).collect();
        assert_eq!(
            to,
            vec!["a@example.com", "b@example.com", "c@example.com", "admin@example.com"]
        );
        assert_eq!(email.email_type, EmailType::AttendeeTicket);
        assert_eq!(email.subject, "Your ticket");
    }

    #[test]
    fn test_single_to_string_is_accepted() {
        let email = request(json!({ "to": "solo@example.com", "orderId": "abc-123" }))
            .into_outgoing()
            .unwrap();
        assert_eq!(email.to.len(), 1);
        assert_eq!(email.email_type, EmailType::OrderConfirmation);
        assert_eq!(email.subject, "Your order confirmation (abc-123)");
        assert_eq!(email.order_reference.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_missing_or_invalid_recipients() {
        assert!(matches!(
            request(json!({ "emailType": "orderConfirmation" })).into_outgoing(),
            Err(NotificationError::NoRecipients)
        ));
        assert!(matches!(
            request(json!({ "customerEmail": "not-an-email" })).into_outgoing(),
            Err(NotificationError::InvalidRecipient { .. })
        ));
    }

    #[test]
    fn test_default_html_summarizes_details() {
        let email = request(json!({
            "to": "x@example.com",
            "subject": "Hi <there>",
            "orderDetails": { "total": "$100.00", "note": "<b>bold</b>" },
        }))
        .into_outgoing()
        .unwrap();
        assert_eq!(email.subject, "Hi <there>");
        assert!(email.html.contains("<h1>Hi &lt;there&gt;</h1>"));
        assert!(email.html.contains("<td>&lt;b&gt;bold&lt;"));
        assert!(!email.html.contains("<b>bold"));
        assert!(email.text.contains("total: $100.00"));
        assert!(email.text.contains("note: <b>bold</b>"));

        let plain = request(json!({ "to": "x@example.com", "orderDetails": "Row 4, seat 12" }))
            .into_outgoing()
            .unwrap();
        assert!(plain.html.contains("<p>Row 4, seat 12</p>"));
        assert!(plain.text.contains("Row 4, seat 12"));

        let custom = request(json!({ "to": "x@example.com", "html": "<p>custom</p>" }))
            .into_outgoing()
            .unwrap();
        assert_eq!(custom.html, "<p>custom</p>");
    }

    #[test]
    fn test_order_confirmation_lists_lines() {
        let now = Utc::now();
        let mut cart = empty_cart(now);
        cart.add_item(&ticket(1, 50, 10), 2, None, now).unwrap();
        let details = CheckoutInput {
            customer_email: "buyer@example.com".to_string(),
            customer_phone: "555-0100".to_string(),
            payment_method: PaymentMethod::Paypal,
            payment_email: Some("payer@example.com".to_string()),
            payment_phone: None,
        }
        .validate()
        .unwrap();
        let mut order = placed_order(checkout(&mut cart, details, now).unwrap());
        order.complete("PP-42", now).unwrap();

        let email = order_confirmation(&order, CurrencyCode::USD).unwrap();
        assert_eq!(email.to, vec![Email::parse("buyer@example.com").unwrap()]);
        assert!(email.html.contains("<td>Ticket 1</td><td>2</td><td>$100.00</td>"));
        assert!(email.text.contains("Total  $100.00"));
        assert!(email.text.contains("PP-42"));

        let admin = admin_notification(
            &order,
            Email::parse("ops@example.com").unwrap(),
            CurrencyCode::USD,
        )
        .unwrap();
        assert_eq!(admin.email_type, EmailType::AdminNotification);
        assert!(admin.subject.starts_with("New order received"));
        assert!(admin.html.contains("buyer@example.com completed an order paid by PayPal"));
        assert!(admin.text.contains("Total  $100.00"));

        let verified = payment_verified(&order, CurrencyCode::USD).unwrap();
        assert_eq!(verified.to, email.to);
        assert!(verified.html.contains("<td>$100.00</td>"));
    }
}

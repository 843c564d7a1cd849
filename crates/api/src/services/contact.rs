//! Contact-form requests forwarded to the support inbox.

use tracing::{info, instrument};

use trackytronics_core::Email;

use super::email::{Mailer, OutgoingEmail};
use crate::config::EmailConfig;
use crate::error::{ApiError, Result};

/// Reply sent back to the customer.
pub const CONTACT_CONFIRMATION: &str =
    "Your request has been sent! Our team will contact you shortly.";

/// Forward a customer's message to support with `Reply-To` set to the customer.
///
/// The message is sent from our own address; relays reject mail whose `From`
/// is a domain we don't control.
///
/// # Errors
///
/// Returns `ApiError::Validation` for an invalid email or empty message, and
/// `ApiError::Email` if delivery fails.
#[instrument(skip_all, fields(customer = %customer_email))]
pub async fn send_contact_request(
    mailer: &dyn Mailer,
    config: &EmailConfig,
    customer_email: &str,
    message: &str,
    phone: Option<&str>,
) -> Result<()> {
    let customer = Email::parse(customer_email)
        .map_err(|e| ApiError::Validation(format!("Invalid email: {e}")))?;
    if message.trim().is_empty() {
        return Err(ApiError::Validation("Message is required".to_string()));
    }
    let phone = phone.map(str::trim).filter(|p| !p.is_empty());

    let email = OutgoingEmail::contact_request(
        &config.from_address,
        &config.support_address,
        customer.as_str(),
        message,
        phone,
    )?;
    mailer.send(email).await?;

    info!("Contact request forwarded");
    Ok(())
}

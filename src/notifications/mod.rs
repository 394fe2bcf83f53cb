//! Admin alerts for new orders over SMS and WhatsApp.

use async_trait::async_trait;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::models::{Order, Payment, PaymentStatus};

const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.twilio.com";

/// Credentials for a Twilio-compatible messaging API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}

/// Injected once at startup. A channel without credentials runs in demo mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminNotificationConfig {
    pub admin_phone: Option<String>,
    pub sms_provider: Option<ProviderCredentials>,
    pub whatsapp_provider: Option<ProviderCredentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Channel {
    #[strum(serialize = "sms")]
    Sms,
    #[strum(serialize = "whatsapp")]
    WhatsApp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub success: bool,
    pub demo: bool,
    pub sid: Option<String>,
    pub error: Option<String>,
}

impl ChannelOutcome {
    fn demo() -> Self {
        Self {
            success: true,
            demo: true,
            ..Default::default()
        }
    }

    fn sent(sid: Option<String>) -> Self {
        Self {
            success: true,
            sid,
            ..Default::default()
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sms: ChannelOutcome,
    pub whatsapp: ChannelOutcome,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Provider rejected message with status {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("No admin phone number configured")]
    MissingRecipient,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify_admin_new_order(
        &self,
        order: &Order,
        payment: &Payment,
    ) -> Result<DispatchReport, NotificationError>;
}

/// Plain-text summary sent to the admin phone.
pub fn format_order_message(order: &Order, payment: &Payment, offset: FixedOffset) -> String {
    let mut message = String::from("NEW ORDER RECEIVED!\n\n");
    let _ = writeln!(message, "Customer: {}", order.customer_name);
    let _ = writeln!(message, "Phone: {}", order.customer_phone);
    let _ = writeln!(message, "Address: {}", order.delivery_address.full_address);
    message.push_str("\nOrder Items:\n");
    for item in &order.items {
        let _ = writeln!(message, "- {} x {}", item.name, item.quantity);
    }
    let paid = if payment.status == PaymentStatus::Success {
        "PAID"
    } else {
        "PENDING"
    };
    let _ = writeln!(message, "\nAmount: Rs.{:.2}", order.total_amount);
    let _ = writeln!(
        message,
        "Payment: {} ({})",
        paid,
        order.payment_method.display_name()
    );
    let _ = writeln!(message, "\nOrder ID: {}", order.order_number);
    let _ = write!(
        message,
        "Time: {}",
        order
            .created_at
            .with_timezone(&offset)
            .format("%d/%m/%Y, %I:%M %p")
    );
    message
}

#[derive(Deserialize)]
struct ProviderResponse {
    sid: Option<String>,
}

/// Sends the admin alert on both channels concurrently
#[derive(Clone)]
pub struct AdminNotifier {
    config: AdminNotificationConfig,
    client: reqwest::Client,
    offset: FixedOffset,
}

impl AdminNotifier {
    pub fn new(config: AdminNotificationConfig, offset: FixedOffset) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            offset,
        }
    }

    async fn send(&self, channel: Channel, message: &str) -> ChannelOutcome {
        let credentials = match channel {
            Channel::Sms => self.config.sms_provider.as_ref(),
            Channel::WhatsApp => self.config.whatsapp_provider.as_ref(),
        };
        let Some(credentials) = credentials else {
            info!(channel = %channel, "Demo mode, message not sent:\n{}", message);
            return ChannelOutcome::demo();
        };

        match self.post_message(channel, credentials, message).await {
            Ok(sid) => {
                info!(channel = %channel, sid = ?sid, "Admin notification sent");
                ChannelOutcome::sent(sid)
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Admin notification failed");
                ChannelOutcome::failed(e.to_string())
            }
        }
    }

    async fn post_message(
        &self,
        channel: Channel,
        credentials: &ProviderCredentials,
        message: &str,
    ) -> Result<Option<String>, NotificationError> {
        let phone = self
            .config
            .admin_phone
            .as_deref()
            .ok_or(NotificationError::MissingRecipient)?;
        let (to, from) = match channel {
            Channel::Sms => (phone.to_string(), credentials.from_number.clone()),
            Channel::WhatsApp => (
                format!("whatsapp:{}", phone),
                format!("whatsapp:{}", credentials.from_number),
            ),
        };
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            credentials.base_url.trim_end_matches('/'),
            credentials.account_sid
        );

        let response = self
            .client
            .post(url)
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", message)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ProviderResponse = response.json().await?;
        Ok(parsed.sid)
    }
}

#[async_trait]
impl NotificationDispatcher for AdminNotifier {
    #[instrument(skip(self, order, payment), fields(order_number = %order.order_number))]
    async fn notify_admin_new_order(
        &self,
        order: &Order,
        payment: &Payment,
    ) -> Result<DispatchReport, NotificationError> {
        let message = format_order_message(order, payment, self.offset);
        if self.config.admin_phone.is_none()
            && (self.config.sms_provider.is_some() || self.config.whatsapp_provider.is_some())
        {
            warn!("Provider credentials configured without an admin phone");
            return Err(NotificationError::MissingRecipient);
        }

        let (sms, whatsapp) = futures::join!(
            self.send(Channel::Sms, &message),
            self.send(Channel::WhatsApp, &message)
        );
        Ok(DispatchReport { sms, whatsapp })
    }
}

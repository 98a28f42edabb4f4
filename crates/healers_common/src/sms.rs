//! Notification Client - one SMS through the provider
//!
//! Credentials and recipient are checked before any network I/O. A send is a
//! single attempt: no retry, no queue.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{ConfigError, SmsConfig, SmsCredentials};
use crate::error::ErrorKind;

/// Account identifiers issued by the provider start with this prefix
pub const ACCOUNT_SID_PREFIX: &str = "AC";

/// Longest body the provider accepts in one request
pub const MAX_BODY_CHARS: usize = 1600;

static E164: OnceLock<Regex> = OnceLock::new();

fn e164() -> &'static Regex {
    E164.get_or_init(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"))
}

/// Whether `number` is an E.164 phone number (`+` then 2-15 digits)
pub fn is_e164(number: &str) -> bool {
    e164().is_match(number)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("SMS service is not configured: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Recipient '{0}' is not an E.164 phone number")]
    InvalidRecipient(String),

    #[error("Sender '{0}' is not an E.164 phone number")]
    InvalidSender(String),

    #[error("Account SID must start with '{prefix}'", prefix = ACCOUNT_SID_PREFIX)]
    InvalidAccountSid,

    #[error("Message body is empty")]
    EmptyMessage,

    #[error("Message body is {0} characters, limit is {max}", max = MAX_BODY_CHARS)]
    MessageTooLong(usize),

    #[error("Failed to send SMS: {0}")]
    Provider(String),
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotifyError::Configuration(_)
            | NotifyError::InvalidSender(_)
            | NotifyError::InvalidAccountSid => ErrorKind::Configuration,
            NotifyError::InvalidRecipient(_)
            | NotifyError::EmptyMessage
            | NotifyError::MessageTooLong(_) => ErrorKind::Validation,
            NotifyError::Provider(_) => ErrorKind::RemoteCall,
        }
    }
}

/// SMS request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsInput {
    /// Recipient in E.164 format
    pub to: String,
    pub message: String,
}

/// SMS flow result as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Provider acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    pub message_id: String,
}

impl From<SmsReceipt> for SmsOutcome {
    fn from(receipt: SmsReceipt) -> Self {
        Self {
            success: true,
            message_id: Some(receipt.message_id),
        }
    }
}

/// Wire-level delivery of an already validated message
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn deliver(
        &self,
        credentials: &SmsCredentials,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, NotifyError>;
}

/// Twilio Messages API transport
pub struct TwilioTransport {
    api_base: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    message: String,
}

impl TwilioTransport {
    pub fn new(config: &SmsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn messages_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, account_sid
        )
    }
}

#[async_trait]
impl SmsTransport for TwilioTransport {
    async fn deliver(
        &self,
        credentials: &SmsCredentials,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, NotifyError> {
        let form = [
            ("To", to),
            ("From", credentials.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url(&credentials.account_sid))
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<TwilioError>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(NotifyError::Provider(detail));
        }

        let message: TwilioMessage = response
            .json()
            .await
            .map_err(|e| NotifyError::Provider(format!("Unreadable provider response: {}", e)))?;

        Ok(SmsReceipt {
            message_id: message.sid,
        })
    }
}

/// Sends single SMS messages with fail-fast validation
pub struct NotificationClient<T: SmsTransport> {
    config: SmsConfig,
    transport: T,
}

impl NotificationClient<TwilioTransport> {
    pub fn from_config(config: &SmsConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config, TwilioTransport::new(config)?))
    }
}

impl<T: SmsTransport> NotificationClient<T> {
    pub fn new(config: &SmsConfig, transport: T) -> Self {
        Self {
            config: config.clone(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check everything that can be checked locally
    pub fn prepare(&self, input: &SmsInput) -> Result<SmsCredentials, NotifyError> {
        let credentials = self.config.credentials()?;

        if self.config.strict && !credentials.account_sid.starts_with(ACCOUNT_SID_PREFIX) {
            return Err(NotifyError::InvalidAccountSid);
        }
        if !is_e164(&credentials.from_number) {
            return Err(NotifyError::InvalidSender(credentials.from_number));
        }
        if !is_e164(&input.to) {
            return Err(NotifyError::InvalidRecipient(input.to.clone()));
        }
        if input.message.trim().is_empty() {
            return Err(NotifyError::EmptyMessage);
        }
        let chars = input.message.chars().count();
        if chars > MAX_BODY_CHARS {
            return Err(NotifyError::MessageTooLong(chars));
        }

        Ok(credentials)
    }

    pub async fn send_sms(&self, to: &str, message: &str) -> Result<SmsReceipt, NotifyError> {
        let input = SmsInput {
            to: to.to_string(),
            message: message.to_string(),
        };
        let credentials = self.prepare(&input)?;

        match self.transport.deliver(&credentials, &input.to, &input.message).await {
            Ok(receipt) => {
                info!("SMS sent successfully. SID: {}", receipt.message_id);
                Ok(receipt)
            }
            Err(e) => {
                error!("Failed to send SMS: {}", e);
                Err(e)
            }
        }
    }
}

/// Transport that records deliveries instead of sending them
pub struct RecordingTransport {
    outcome: Result<String, NotifyError>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    /// Every delivery succeeds with `message_id`
    pub fn accepting(message_id: &str) -> Self {
        Self {
            outcome: Ok(message_id.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every delivery fails with a provider error
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(NotifyError::Provider(reason.to_string())),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn deliver(
        &self,
        _credentials: &SmsCredentials,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        self.outcome.clone().map(|message_id| SmsReceipt { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SmsConfig {
        SmsConfig {
            account_sid: Some("AC0123456789abcdef".to_string()),
            auth_token: Some("token".to_string()),
            from_number: Some("+15005550006".to_string()),
            ..SmsConfig::default()
        }
    }

    #[test]
    fn test_e164() {
        assert!(is_e164("+919876543210"));
        assert!(is_e164("+15005550006"));
        assert!(!is_e164("123"));
        assert!(!is_e164("+0123456"));
        assert!(!is_e164("+1"));
        assert!(!is_e164("+1234567890123456"));
        assert!(!is_e164("+1 500 555 0006"));
    }

    #[tokio::test]
    async fn test_send_success() {
        let client = NotificationClient::new(&configured(), RecordingTransport::accepting("SM1"));

        let receipt = client
            .send_sms("+919876543210", "Help is on the way")
            .await
            .unwrap();
        assert_eq!(receipt.message_id, "SM1");
        assert_eq!(
            client.transport().sent(),
            vec![("+919876543210".to_string(), "Help is on the way".to_string())]
        );

        let outcome: SmsOutcome = receipt.into();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["messageId"], "SM1");
    }

    #[tokio::test]
    async fn test_strict_mode_checks_sid_prefix() {
        let mut config = configured();
        config.account_sid = Some("XX0123".to_string());
        let client = NotificationClient::new(&config, RecordingTransport::accepting("SM1"));

        let err = client.send_sms("+919876543210", "hi").await.unwrap_err();
        assert_eq!(err, NotifyError::InvalidAccountSid);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(client.transport().attempts(), 0);

        config.strict = false;
        let lenient = NotificationClient::new(&config, RecordingTransport::accepting("SM1"));
        assert!(lenient.send_sms("+919876543210", "hi").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_and_oversized_messages() {
        let client = NotificationClient::new(&configured(), RecordingTransport::accepting("SM1"));

        assert_eq!(
            client.send_sms("+919876543210", "  ").await.unwrap_err(),
            NotifyError::EmptyMessage
        );
        let long = "x".repeat(MAX_BODY_CHARS + 1);
        assert_eq!(
            client.send_sms("+919876543210", &long).await.unwrap_err(),
            NotifyError::MessageTooLong(MAX_BODY_CHARS + 1)
        );
        assert_eq!(client.transport().attempts(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retried() {
        let client = NotificationClient::new(&configured(), RecordingTransport::failing("queue full"));

        let err = client.send_sms("+919876543210", "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert_eq!(client.transport().attempts(), 1);
    }

    #[test]
    fn test_messages_url() {
        let transport = TwilioTransport::new(&SmsConfig::default()).unwrap();
        assert_eq!(
            transport.messages_url("AC1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Messages.json"
        );
    }
}

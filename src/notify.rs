/// SMS notification for the latest spray advisory.
///
/// The notifier reads the most recent prediction, formats the probability
/// to one decimal place, and dispatches it through an HTTP SMS gateway
/// (Twilio-compatible REST dispatch: form POST with basic auth). The
/// gateway is behind a trait so the notify job can be exercised without
/// a live account.

use serde::Deserialize;

use crate::model::PipelineError;

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

/// Formats the advisory message with the probability as a one-decimal
/// percentage.
pub fn format_probability_message(score: f64) -> String {
    format!(
        "Chance that tomorrow is a good day to spray: {:.1}%",
        score * 100.0
    )
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// An outbound messaging channel.
pub trait SmsGateway {
    /// Sends `body` to `recipient`. Returns the gateway's message id as
    /// the delivery acknowledgment.
    fn send(&self, recipient: &str, body: &str) -> Result<String, PipelineError>;
}

/// Twilio-compatible HTTP gateway.
pub struct HttpSmsGateway {
    client: reqwest::blocking::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    sender: String,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    sid: String,
}

impl HttpSmsGateway {
    pub fn new(
        client: reqwest::blocking::Client,
        base_url: &str,
        account_sid: &str,
        auth_token: &str,
        sender: &str,
    ) -> Self {
        HttpSmsGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            sender: sender.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }
}

impl SmsGateway for HttpSmsGateway {
    fn send(&self, recipient: &str, body: &str) -> Result<String, PipelineError> {
        let params = [("To", recipient), ("From", self.sender.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .map_err(|e| PipelineError::MessagingDispatch(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(PipelineError::MessagingDispatch(format!(
                "HTTP {}: {}",
                status, detail
            )));
        }

        let ack: DispatchResponse = response
            .json()
            .map_err(|e| PipelineError::MessagingDispatch(format!("malformed ack: {}", e)))?;
        Ok(ack.sid)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_score_formats_to_one_decimal() {
        let message = format_probability_message(0.5);
        assert!(message.contains("50.0%"), "got: {}", message);
    }

    #[test]
    fn test_high_score_is_not_rounded_to_hundred() {
        let message = format_probability_message(0.999);
        assert!(message.contains("99.9%"), "got: {}", message);
    }

    #[test]
    fn test_zero_and_one_are_representable() {
        assert!(format_probability_message(0.0).contains("0.0%"));
        assert!(format_probability_message(1.0).contains("100.0%"));
    }

    #[test]
    fn test_messages_url_joins_without_double_slash() {
        let gateway = HttpSmsGateway::new(
            reqwest::blocking::Client::new(),
            "https://sms.example.com/2010-04-01/",
            "AC123",
            "token",
            "+15005550006",
        );
        assert_eq!(
            gateway.messages_url(),
            "https://sms.example.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}

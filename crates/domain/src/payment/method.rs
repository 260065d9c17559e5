use serde::{Deserialize, Serialize};

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    Boleto,
    PayPal,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Pix,
        PaymentMethod::Boleto,
        PaymentMethod::PayPal,
    ];

    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }

    /// Settles immediately (PIX).
    pub fn is_instant(&self) -> bool {
        matches!(self, PaymentMethod::Pix)
    }

    /// Settles days later (boleto).
    pub fn is_delayed(&self) -> bool {
        matches!(self, PaymentMethod::Boleto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CreditCard",
            PaymentMethod::DebitCard => "DebitCard",
            PaymentMethod::Pix => "Pix",
            PaymentMethod::Boleto => "Boleto",
            PaymentMethod::PayPal => "PayPal",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown payment method: {0}")]
pub struct ParsePaymentMethodError(pub String);

impl std::str::FromStr for PaymentMethod {
    type Err = ParsePaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ParsePaymentMethodError(s.to_string()))
    }
}

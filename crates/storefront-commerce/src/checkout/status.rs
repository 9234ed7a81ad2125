//! Order and payment status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status.
///
/// ```text
/// Pending -> Processing -> Shipped -> Delivered
///    |           |            |          |
///    v           v            +----------+--> Refunded
/// Cancelled <----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,
    /// Order confirmed and being prepared.
    Processing,
    /// Order handed to the carrier.
    Shipped,
    /// Order delivered.
    Delivered,
    /// Order cancelled before shipping.
    Cancelled,
    /// Order refunded.
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Processing, Refunded)
                | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Check if order is in a state no transition leaves, other than a refund.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Whether entering this status puts reserved stock back.
    pub fn returns_stock(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Check if the order can be deleted outright.
    pub fn can_delete(&self) -> bool {
        *self == OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Cash collected by the carrier on delivery.
    #[default]
    CashOnDelivery,
    /// Manual bank transfer, confirmed by an operator.
    BankTransfer,
    /// Card payment through the gateway.
    Card,
    /// E-wallet payment through the gateway.
    EWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::EWallet => "ewallet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cod" | "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            "bank_transfer" | "bank" => Some(PaymentMethod::BankTransfer),
            "card" => Some(PaymentMethod::Card),
            "ewallet" | "e_wallet" => Some(PaymentMethod::EWallet),
            _ => None,
        }
    }

    /// Prepaid methods whose failure must abort checkout.
    pub fn requires_synchronous_confirmation(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::EWallet)
    }

    pub fn is_cash_on_delivery(&self) -> bool {
        *self == PaymentMethod::CashOnDelivery
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Payment not received yet.
    #[default]
    Pending,
    /// Payment received.
    Completed,
    /// Payment failed or was abandoned.
    Failed,
    /// Payment returned to the customer.
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Payment status after the order moves to `status`.
    pub fn after_transition(&self, status: OrderStatus, method: PaymentMethod) -> PaymentStatus {
        match status {
            OrderStatus::Delivered if method.is_cash_on_delivery() => PaymentStatus::Completed,
            OrderStatus::Cancelled if *self == PaymentStatus::Completed => PaymentStatus::Refunded,
            OrderStatus::Cancelled => PaymentStatus::Failed,
            OrderStatus::Refunded => PaymentStatus::Refunded,
            _ => *self,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_listed_transitions_are_legal() {
        use OrderStatus::*;
        let legal = [
            (Pending, Processing),
            (Pending, Cancelled),
            (Processing, Cancelled),
            (Processing, Shipped),
            (Shipped, Delivered),
            (Processing, Refunded),
            (Shipped, Refunded),
            (Delivered, Refunded),
        ];
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(OrderStatus::parse("Shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn test_payment_coupling() {
        let cod = PaymentMethod::CashOnDelivery;
        assert_eq!(
            PaymentStatus::Pending.after_transition(OrderStatus::Delivered, cod),
            PaymentStatus::Completed
        );
        assert_eq!(
            PaymentStatus::Pending.after_transition(OrderStatus::Delivered, PaymentMethod::BankTransfer),
            PaymentStatus::Pending
        );
        assert_eq!(
            PaymentStatus::Completed.after_transition(OrderStatus::Cancelled, PaymentMethod::Card),
            PaymentStatus::Refunded
        );
        assert_eq!(
            PaymentStatus::Pending.after_transition(OrderStatus::Cancelled, cod),
            PaymentStatus::Failed
        );
        assert_eq!(
            PaymentStatus::Completed.after_transition(OrderStatus::Refunded, cod),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn test_prepaid_methods() {
        assert!(PaymentMethod::Card.requires_synchronous_confirmation());
        assert!(PaymentMethod::EWallet.requires_synchronous_confirmation());
        assert!(!PaymentMethod::CashOnDelivery.requires_synchronous_confirmation());
        assert!(!PaymentMethod::BankTransfer.requires_synchronous_confirmation());
    }
}

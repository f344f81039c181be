//! Types that are stored in, or read from, the order store.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use pay_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed, but no payment has been confirmed.
    Pending,
    /// Payment has been confirmed and the order is being prepared.
    Processing,
    /// Payment has been confirmed and the merchant has accepted the order.
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatusType {
    /// Once an order reaches one of these states, nothing about its status will change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// The statuses a freshly paid order may be placed in.
    pub fn is_paid_entry_status(&self) -> bool {
        matches!(self, Self::Processing | Self::Confirmed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Paid => f.write_str("paid"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: Option<String>,
    pub customer_email: Option<String>,
    pub total_amount: Cents,
    pub delivery_fee: Cents,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub delivery_method: Option<String>,
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A snapshot of a product line at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub size: Option<String>,
    pub color: Option<String>,
    pub original_price: Option<Cents>,
    pub discounted_price: Option<Cents>,
    pub savings_amount: Option<Cents>,
}

impl OrderItem {
    /// The price actually charged per unit, taking bulk or special-offer pricing into account.
    pub fn effective_price(&self) -> Cents {
        self.discounted_price.unwrap_or(self.unit_price)
    }

    pub fn line_total(&self) -> Cents {
        self.effective_price() * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub original_price: Option<Cents>,
    #[serde(default)]
    pub discounted_price: Option<Cents>,
    #[serde(default)]
    pub savings_amount: Option<Cents>,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, quantity: i64, unit_price: Cents) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
            size: None,
            color: None,
            original_price: None,
            discounted_price: None,
            savings_amount: None,
        }
    }

    pub fn with_variant(mut self, size: Option<String>, color: Option<String>) -> Self {
        self.size = size;
        self.color = color;
        self
    }

    /// Applies a bulk or special-offer price. The savings are derived from the difference to `unit_price`.
    pub fn with_discount(mut self, discounted_price: Cents) -> Self {
        self.original_price = Some(self.unit_price);
        self.discounted_price = Some(discounted_price);
        self.savings_amount = (self.unit_price - discounted_price).checked_mul(self.quantity);
        self
    }

    /// `None` if the line total overflows.
    pub fn line_total(&self) -> Option<Cents> {
        self.discounted_price.unwrap_or(self.unit_price).checked_mul(self.quantity)
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    /// Assigned by the store from the row id when not given.
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub total_amount: Cents,
    #[serde(default)]
    pub delivery_fee: Cents,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, total_amount: Cents) -> Self {
        Self {
            order_id,
            order_number: None,
            user_id: None,
            customer_email: None,
            total_amount,
            delivery_fee: Cents::default(),
            delivery_method: None,
            items: vec![],
        }
    }

    pub fn for_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    pub fn with_order_number<S: Into<String>>(mut self, order_number: S) -> Self {
        self.order_number = Some(order_number.into());
        self
    }

    pub fn with_delivery(mut self, method: &str, fee: Cents) -> Self {
        self.delivery_method = Some(method.to_string());
        self.delivery_fee = fee;
        self
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    /// The sum of all line totals plus the delivery fee. Checkout computes `total_amount` the same way.
    ///
    /// Returns `None` if any part of the sum overflows.
    pub fn calculated_total(&self) -> Option<Cents> {
        let items = self.items.iter().map(NewOrderItem::line_total).collect::<Option<Vec<_>>>()?;
        Cents::checked_sum(items)?.checked_add(self.delivery_fee)
    }
}

/// Formats a human-readable order number from the order's row id.
pub fn order_number_for(id: i64) -> String {
    format!("SF-{id:06}")
}

//--------------------------------------    TrackingInfo     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
}

impl TrackingInfo {
    pub fn is_empty(&self) -> bool {
        self.tracking_code.is_none() && self.tracking_url.is_none()
    }
}

//--------------------------------------      CartItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl NewCartItem {
    pub fn new<S: Into<String>, P: Into<String>>(user_id: S, product_id: P, quantity: i64) -> Self {
        Self { user_id: user_id.into(), product_id: product_id.into(), quantity, size: None, color: None }
    }
}

//--------------------------------------   ProductSummary    ---------------------------------------------------------
/// The sliver of the product catalogue that the confirmation email needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

impl ProductSummary {
    pub fn new<S: Into<String>, N: Into<String>>(id: S, name: N) -> Self {
        Self { id: id.into(), name: name.into(), image_url: None }
    }

    pub fn with_image<S: Into<String>>(mut self, url: S) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip_and_terminal_states() {
        for s in ["pending", "processing", "confirmed", "shipped", "delivered", "cancelled", "refunded"] {
            let status = s.parse::<OrderStatusType>().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert_eq!("Shipped".parse::<OrderStatusType>().unwrap(), OrderStatusType::Shipped);
        assert!("lost".parse::<OrderStatusType>().is_err());
        assert_eq!(OrderStatusType::from("bogus".to_string()), OrderStatusType::Pending);
        let terminal = [OrderStatusType::Delivered, OrderStatusType::Cancelled, OrderStatusType::Refunded];
        assert!(terminal.iter().all(|s| s.is_terminal()));
        assert!(!OrderStatusType::Shipped.is_terminal());
        assert!(OrderStatusType::Processing.is_paid_entry_status());
        assert!(!OrderStatusType::Shipped.is_paid_entry_status());
    }

    #[test]
    fn order_totals_use_offer_prices() {
        let order = NewOrder::new("ORD-1".into(), Cents::from(0))
            .with_item(NewOrderItem::new("tee", 2, Cents::from_major(200)))
            .with_item(NewOrderItem::new("cap", 4, Cents::from_major(50)).with_discount(Cents::from_major(40)))
            .with_delivery("courier", Cents::from_major(60));
        assert_eq!(order.calculated_total(), Some(Cents::from_major(620)));
        let cap = &order.items[1];
        assert_eq!(cap.savings_amount, Some(Cents::from_major(40)));
        assert_eq!(cap.original_price, Some(Cents::from_major(50)));
        let huge = NewOrder::new("ORD-2".into(), Cents::from(0))
            .with_item(NewOrderItem::new("tee", 4_000_000_000, Cents::from(4_000_000_000_000)));
        assert_eq!(huge.calculated_total(), None);
    }

    #[test]
    fn empty_order_ids_are_rejected() {
        assert!("  ".parse::<OrderId>().is_err());
        assert_eq!(" ORD-1001 ".parse::<OrderId>().unwrap().as_str(), "ORD-1001");
        assert_eq!(order_number_for(42), "SF-000042");
    }
}

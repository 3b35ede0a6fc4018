//! Order Aggregate
//!
//! An order is a frozen, priced copy of a cart. Pricing, line items, the
//! shipping address, tracking number and estimated delivery are written once
//! at placement; afterwards only the status, payment status, cancellation
//! metadata and the append-only tracking history change.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Caller, Money, MoneyError, OrderId, ProductId, Quantity, ShippingAddress, UserId};
use crate::EngineError;

pub const TAX_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);
pub const FREE_SHIPPING_ABOVE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
pub const CARRIER: &str = "DashMart Express";
const WAREHOUSE: &str = "DashMart Warehouse";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Whether the buyer may still cancel.
    pub fn is_cancellable(&self) -> bool { !matches!(self, Self::Shipped | Self::Delivered | Self::Cancelled) }

    pub fn counts_toward_revenue(&self) -> bool { matches!(self, Self::Shipped | Self::Delivered) }

    /// Position in the fulfillment sequence; cancellation sits outside it.
    fn step(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Canned tracking entry for a seller-driven transition. `Pending` has none.
    fn tracking_template(&self) -> Option<(&'static str, &'static str, &'static str)> {
        match self {
            Self::Pending => None,
            Self::Confirmed => Some(("Order Confirmed", WAREHOUSE, "Your order has been confirmed and is being prepared for processing.")),
            Self::Processing => Some(("Processing", WAREHOUSE, "Your order is being processed and will be shipped soon.")),
            Self::Shipped => Some(("Shipped", "DashMart Express Hub", "Your order has been shipped and is on its way to you.")),
            Self::Delivered => Some(("Delivered", "Your Address", "Your order has been successfully delivered!")),
            Self::Cancelled => Some(("Cancelled", WAREHOUSE, "Your order has been cancelled.")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = EngineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| EngineError::InvalidArgument(format!("Invalid status: {s}")))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod { #[default] #[serde(rename = "COD")] Cod, Online }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus { #[default] Pending, Paid, Failed }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl LineItem {
    /// Freezes the product's current offer price into the line.
    pub fn from_product(product: &Product, quantity: Quantity) -> Self {
        Self { product_id: product.id(), name: product.name().to_string(), quantity, unit_price: product.offer_price().clone() }
    }
    pub fn total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Pricing {
    pub fn from_items(items: &[LineItem], currency: &str) -> Result<Self, MoneyError> {
        let subtotal = items.iter().try_fold(Money::zero(currency), |acc, i| acc.add(&i.total()))?;
        let tax = subtotal.apply_rate(TAX_RATE);
        let shipping = if subtotal.amount() > FREE_SHIPPING_ABOVE {
            Money::zero(currency)
        } else {
            Money::new(SHIPPING_FEE, currency)
        };
        let total = subtotal.add(&tax)?.add(&shipping)?;
        Ok(Self { subtotal, tax, shipping, total })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub status: String,
    pub location: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracking {
    pub number: String,
    pub carrier: String,
    pub estimated_delivery: DateTime<Utc>,
    pub updates: Vec<TrackingUpdate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelledBy { #[default] User, Seller, System }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: CancelledBy,
    pub reason: String,
}

/// Rule applied to seller-driven status changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any status may be set from any status.
    #[default]
    Permissive,
    /// Only later fulfillment steps, or cancellation before shipping.
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> Result<(), EngineError> {
        let allowed = match self {
            Self::Permissive => true,
            Self::ForwardOnly if from.is_terminal() => false,
            Self::ForwardOnly => match (from.step(), to.step()) {
                (Some(f), Some(t)) => t > f,
                _ => from.is_cancellable(),
            },
        };
        if allowed { Ok(()) } else { Err(EngineError::InvalidState(format!("Cannot move order from {from} to {to}"))) }
    }
}

impl FromStr for TransitionPolicy {
    type Err = EngineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "forward-only" => Ok(Self::ForwardOnly),
            other => Err(EngineError::InvalidArgument(format!("Unknown transition policy: {other}"))),
        }
    }
}

/// Everything needed to place an order, already priced from the catalog.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub owner: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    owner: UserId,
    items: Vec<LineItem>,
    shipping_address: ShippingAddress,
    payment: Payment,
    #[serde(flatten)]
    pricing: Pricing,
    order_status: OrderStatus,
    tracking: Tracking,
    notes: Option<String>,
    is_cancelled: bool,
    cancellation: Option<Cancellation>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(new: NewOrder) -> Result<Self, EngineError> {
        if new.items.is_empty() { return Err(EngineError::EmptyCart); }
        new.shipping_address.ensure_complete()?;
        let pricing = Pricing::from_items(&new.items, &new.currency)?;
        let now = Utc::now();
        let payment = match new.payment_method {
            PaymentMethod::Online => Payment {
                method: PaymentMethod::Online, status: PaymentStatus::Paid,
                transaction_id: Some(reference_code("TXN", now)), amount: pricing.total.clone(),
            },
            PaymentMethod::Cod => Payment {
                method: PaymentMethod::Cod, status: PaymentStatus::Pending,
                transaction_id: None, amount: pricing.total.clone(),
            },
        };
        let delivery_days = rand::thread_rng().gen_range(3..=7);
        let tracking = Tracking {
            number: reference_code("DM", now),
            carrier: CARRIER.to_string(),
            estimated_delivery: now + Duration::days(delivery_days),
            updates: vec![TrackingUpdate {
                status: "Order Placed".into(), location: WAREHOUSE.into(),
                description: "Your order has been successfully placed and is being processed.".into(), timestamp: now,
            }],
        };
        let mut order = Self {
            id: OrderId::generate(), owner: new.owner, items: new.items, shipping_address: new.shipping_address,
            payment, pricing, order_status: OrderStatus::Pending, tracking, notes: new.notes,
            is_cancelled: false, cancellation: None, created_at: now, updated_at: now, version: 0, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, owner: order.owner.clone(), total: order.pricing.total.amount(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn owner(&self) -> &UserId { &self.owner }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn payment(&self) -> &Payment { &self.payment }
    pub fn pricing(&self) -> &Pricing { &self.pricing }
    pub fn total(&self) -> &Money { &self.pricing.total }
    pub fn status(&self) -> OrderStatus { self.order_status }
    pub fn tracking(&self) -> &Tracking { &self.tracking }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn is_cancelled(&self) -> bool { self.is_cancelled }
    pub fn cancellation(&self) -> Option<&Cancellation> { self.cancellation.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn version(&self) -> u64 { self.version }

    /// Buyers may only see their own orders; sellers see everything.
    pub fn ensure_visible_to(&self, caller: &Caller) -> Result<(), EngineError> {
        match caller {
            Caller::Seller(_) => Ok(()),
            Caller::Buyer(user) if *user == self.owner => Ok(()),
            Caller::Buyer(_) => Err(EngineError::Forbidden("Not authorized to view this order".into())),
        }
    }

    /// Seller-driven status change. Every call to a non-`Pending` status
    /// appends one tracking entry, even when the status does not change.
    pub fn advance_to(&mut self, new_status: OrderStatus, policy: TransitionPolicy) -> Result<(), EngineError> {
        policy.check(self.order_status, new_status)?;
        let from = self.order_status;
        let now = Utc::now();
        self.order_status = new_status;
        if let Some((label, location, description)) = new_status.tracking_template() {
            self.push_update(label, location, description, now);
        }
        if new_status == OrderStatus::Delivered && self.payment.method == PaymentMethod::Cod {
            self.payment.status = PaymentStatus::Paid;
        }
        if new_status == OrderStatus::Cancelled && !self.is_cancelled {
            self.record_cancellation(CancelledBy::Seller, "Cancelled by seller".into(), now);
        }
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: new_status }));
        Ok(())
    }

    /// Buyer-driven cancellation.
    pub fn cancel_by_owner(&mut self, caller: &UserId, reason: Option<String>) -> Result<(), EngineError> {
        if *caller != self.owner {
            return Err(EngineError::Forbidden("Not authorized to cancel this order".into()));
        }
        if !self.order_status.is_cancellable() {
            return Err(EngineError::InvalidState("Order cannot be cancelled at this stage".into()));
        }
        let now = Utc::now();
        self.order_status = OrderStatus::Cancelled;
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| "Cancelled by user".into());
        self.record_cancellation(CancelledBy::User, reason, now);
        self.push_update("Cancelled", WAREHOUSE, "Order cancelled by user.", now);
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id, by: CancelledBy::User }));
        Ok(())
    }

    /// Advances the version ahead of a conditional write and returns the
    /// version the store must still hold.
    pub(crate) fn bump_version(&mut self) -> u64 {
        let expected = self.version;
        self.version += 1;
        expected
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }

    fn record_cancellation(&mut self, by: CancelledBy, reason: String, at: DateTime<Utc>) {
        self.is_cancelled = true;
        self.cancellation = Some(Cancellation { cancelled_at: at, cancelled_by: by, reason });
    }

    fn push_update(&mut self, label: &str, location: &str, description: &str, at: DateTime<Utc>) {
        self.tracking.updates.push(TrackingUpdate {
            status: label.into(), location: location.into(), description: description.into(), timestamp: at,
        });
    }
}

/// An order as handed back to callers. Each line item is paired with the
/// product's current catalog entry, `None` once the product is gone. The
/// frozen price on the line item stays authoritative.
#[derive(Clone, Debug)]
pub struct OrderView {
    order: Order,
    products: Vec<Option<Product>>,
}

impl OrderView {
    /// `products` follows the order's line items.
    pub fn new(order: Order, products: Vec<Option<Product>>) -> Self { Self { order, products } }
    pub fn order(&self) -> &Order { &self.order }
    pub fn product(&self, line: usize) -> Option<&Product> { self.products.get(line).and_then(Option::as_ref) }
    pub fn into_order(self) -> Order { self.order }
}

impl std::ops::Deref for OrderView {
    type Target = Order;
    fn deref(&self) -> &Order { &self.order }
}

impl Serialize for OrderView {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct ResolvedItem<'a> {
            #[serde(flatten)]
            item: &'a LineItem,
            product: Option<&'a Product>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Repr<'a> {
            id: OrderId,
            owner: &'a UserId,
            items: Vec<ResolvedItem<'a>>,
            shipping_address: &'a ShippingAddress,
            payment: &'a Payment,
            #[serde(flatten)]
            pricing: &'a Pricing,
            order_status: OrderStatus,
            tracking: &'a Tracking,
            notes: Option<&'a str>,
            is_cancelled: bool,
            cancellation: Option<&'a Cancellation>,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            version: u64,
        }

        let o = &self.order;
        Repr {
            id: o.id,
            owner: &o.owner,
            items: o.items.iter().enumerate().map(|(i, item)| ResolvedItem { item, product: self.product(i) }).collect(),
            shipping_address: &o.shipping_address,
            payment: &o.payment,
            pricing: &o.pricing,
            order_status: o.order_status,
            tracking: &o.tracking,
            notes: o.notes.as_deref(),
            is_cancelled: o.is_cancelled,
            cancellation: o.cancellation.as_ref(),
            created_at: o.created_at,
            updated_at: o.updated_at,
            version: o.version,
        }
        .serialize(serializer)
    }
}

/// `prefix` + last 8 digits of the epoch-millis clock + 4 random upper-case alphanumerics.
fn reference_code(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(100_000_000);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{prefix}{millis:08}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::address;

    fn item(price: i64, qty: u32) -> LineItem {
        LineItem {
            product_id: ProductId::generate(), name: "Widget".into(),
            quantity: Quantity::new(qty).unwrap(), unit_price: Money::new(Decimal::new(price, 0), "INR"),
        }
    }

    fn place(items: Vec<LineItem>, method: PaymentMethod) -> Order {
        Order::place(NewOrder {
            owner: UserId::new("buyer-1"), items, shipping_address: address(),
            payment_method: method, notes: None, currency: "INR".into(),
        }).unwrap()
    }

    #[test]
    fn test_pricing_free_shipping_above_threshold() {
        let p = Pricing::from_items(&[item(300, 2)], "INR").unwrap();
        assert_eq!(p.subtotal.amount(), Decimal::new(600, 0));
        assert_eq!(p.shipping.amount(), Decimal::ZERO);
        assert_eq!(p.tax.amount(), Decimal::new(12, 0));
        assert_eq!(p.total.amount(), Decimal::new(612, 0));
    }

    #[test]
    fn test_pricing_charges_shipping_at_or_below_threshold() {
        let p = Pricing::from_items(&[item(100, 1)], "INR").unwrap();
        assert_eq!(p.shipping.amount(), Decimal::new(50, 0));
        assert_eq!(p.tax.amount(), Decimal::new(2, 0));
        assert_eq!(p.total.amount(), Decimal::new(152, 0));
        // exactly 500 is not "above" 500
        let p = Pricing::from_items(&[item(250, 2)], "INR").unwrap();
        assert_eq!(p.shipping.amount(), Decimal::new(50, 0));
    }

    #[test]
    fn test_place_order_initial_state() {
        let order = place(vec![item(100, 1)], PaymentMethod::Cod);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.tracking().updates.len(), 1);
        assert_eq!(order.tracking().updates[0].status, "Order Placed");
        assert_eq!(order.tracking().carrier, CARRIER);
        assert_eq!(order.payment().status, PaymentStatus::Pending);
        assert!(order.payment().transaction_id.is_none());
        assert_eq!(&order.payment().amount, order.total());
        assert!(!order.is_cancelled());
    }

    #[test]
    fn test_online_order_is_paid_with_transaction_id() {
        let order = place(vec![item(100, 1)], PaymentMethod::Online);
        assert_eq!(order.payment().status, PaymentStatus::Paid);
        let txn = order.payment().transaction_id.as_deref().unwrap();
        assert!(txn.starts_with("TXN"));
        assert_eq!(txn.len(), 15);
    }

    #[test]
    fn test_tracking_number_and_delivery_window() {
        let order = place(vec![item(100, 1)], PaymentMethod::Cod);
        let number = &order.tracking().number;
        assert!(number.starts_with("DM") && number.len() == 14, "{number}");
        assert!(number[2..10].chars().all(|c| c.is_ascii_digit()));
        assert!(number[10..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        let days = (order.tracking().estimated_delivery - order.created_at()).num_days();
        assert!((3..=7).contains(&days), "{days}");
    }

    #[test]
    fn test_place_rejects_empty_items() {
        let err = Order::place(NewOrder {
            owner: UserId::new("b"), items: vec![], shipping_address: address(),
            payment_method: PaymentMethod::Cod, notes: None, currency: "INR".into(),
        }).unwrap_err();
        assert!(matches!(err, EngineError::EmptyCart));
    }

    #[test]
    fn test_place_raises_placed_event() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        let events = order.take_events();
        assert!(matches!(events.as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_each_advance_appends_one_entry() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Online);
        for status in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
            let before = order.tracking().updates.len();
            order.advance_to(status, TransitionPolicy::Permissive).unwrap();
            assert_eq!(order.tracking().updates.len(), before + 1);
            assert_eq!(order.status(), status);
        }
    }

    #[test]
    fn test_repeated_status_still_appends() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        for _ in 0..3 {
            order.advance_to(OrderStatus::Processing, TransitionPolicy::Permissive).unwrap();
        }
        assert_eq!(order.tracking().updates.len(), 4);
    }

    #[test]
    fn test_advance_to_pending_appends_nothing() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        order.advance_to(OrderStatus::Shipped, TransitionPolicy::Permissive).unwrap();
        order.advance_to(OrderStatus::Pending, TransitionPolicy::Permissive).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.tracking().updates.len(), 2);
    }

    #[test]
    fn test_cod_paid_on_delivery() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        order.advance_to(OrderStatus::Delivered, TransitionPolicy::Permissive).unwrap();
        assert_eq!(order.payment().status, PaymentStatus::Paid);
    }

    #[test]
    fn test_online_payment_unchanged_on_delivery() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Online);
        let txn = order.payment().transaction_id.clone();
        order.advance_to(OrderStatus::Delivered, TransitionPolicy::Permissive).unwrap();
        assert_eq!(order.payment().status, PaymentStatus::Paid);
        assert_eq!(order.payment().transaction_id, txn);
    }

    #[test]
    fn test_status_changes_never_alter_pricing() {
        let mut order = place(vec![item(300, 2)], PaymentMethod::Cod);
        let pricing = order.pricing().clone();
        for status in OrderStatus::ALL {
            order.advance_to(status, TransitionPolicy::Permissive).unwrap();
        }
        assert_eq!(order.pricing(), &pricing);
    }

    #[test]
    fn test_owner_cancel_rules() {
        let buyer = UserId::new("buyer-1");
        for status in OrderStatus::ALL {
            let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
            order.advance_to(status, TransitionPolicy::Permissive).unwrap();
            let entries = order.tracking().updates.len();
            let result = order.cancel_by_owner(&buyer, None);
            if matches!(status, OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled) {
                assert!(matches!(result, Err(EngineError::InvalidState(_))), "{status}");
                assert_eq!(order.tracking().updates.len(), entries);
            } else {
                assert!(result.is_ok(), "{status}");
                assert!(order.is_cancelled());
                assert_eq!(order.tracking().updates.len(), entries + 1);
                let c = order.cancellation().unwrap();
                assert_eq!(c.cancelled_by, CancelledBy::User);
                assert_eq!(c.reason, "Cancelled by user");
            }
        }
    }

    #[test]
    fn test_cancel_by_other_buyer_is_forbidden() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        let err = order.cancel_by_owner(&UserId::new("someone-else"), Some("changed mind".into())).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_twice_sets_metadata_once() {
        let buyer = UserId::new("buyer-1");
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        order.cancel_by_owner(&buyer, Some("Ordered by mistake".into())).unwrap();
        let first = order.cancellation().cloned();
        assert!(order.cancel_by_owner(&buyer, None).is_err());
        assert_eq!(order.cancellation().cloned(), first);
        assert_eq!(first.unwrap().reason, "Ordered by mistake");
    }

    #[test]
    fn test_seller_cancel_records_seller() {
        let mut order = place(vec![item(100, 1)], PaymentMethod::Cod);
        order.advance_to(OrderStatus::Cancelled, TransitionPolicy::Permissive).unwrap();
        assert!(order.is_cancelled());
        assert_eq!(order.cancellation().unwrap().cancelled_by, CancelledBy::Seller);
        assert_eq!(order.tracking().updates.last().unwrap().description, "Your order has been cancelled.");
    }

    #[test]
    fn test_forward_only_policy() {
        let p = TransitionPolicy::ForwardOnly;
        assert!(p.check(OrderStatus::Pending, OrderStatus::Confirmed).is_ok());
        assert!(p.check(OrderStatus::Pending, OrderStatus::Shipped).is_ok());
        assert!(p.check(OrderStatus::Processing, OrderStatus::Cancelled).is_ok());
        assert!(p.check(OrderStatus::Delivered, OrderStatus::Pending).is_err());
        assert!(p.check(OrderStatus::Shipped, OrderStatus::Cancelled).is_err());
        assert!(p.check(OrderStatus::Cancelled, OrderStatus::Confirmed).is_err());
        assert!(p.check(OrderStatus::Confirmed, OrderStatus::Confirmed).is_err());
        assert!(TransitionPolicy::Permissive.check(OrderStatus::Delivered, OrderStatus::Pending).is_ok());
    }

    #[test]
    fn test_forward_only_terminal_statuses_are_final() {
        let p = TransitionPolicy::ForwardOnly;
        for from in OrderStatus::ALL.into_iter().filter(OrderStatus::is_terminal) {
            for to in OrderStatus::ALL {
                assert!(p.check(from, to).is_err(), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_status_parse_is_case_sensitive() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!(matches!("shipped".parse::<OrderStatus>(), Err(EngineError::InvalidArgument(_))));
        assert!("Refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_json_vocabulary() {
        let order = place(vec![item(100, 1)], PaymentMethod::Cod);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderStatus"], "Pending");
        assert_eq!(json["payment"]["method"], "COD");
        assert_eq!(json["payment"]["status"], "Pending");
        assert!(json["payment"]["transactionId"].is_null());
        assert!(json.get("subtotal").is_some() && json.get("total").is_some());
        assert_eq!(json["isCancelled"], false);
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), order.id());
        assert_eq!(back.pricing(), order.pricing());
    }

    #[test]
    fn test_view_resolves_line_products() {
        let order = place(vec![item(100, 1), item(40, 2)], PaymentMethod::Cod);
        let current = Product::new(
            order.items()[0].product_id, "Widget v2",
            Money::new(Decimal::new(150, 0), "INR"), Money::new(Decimal::new(90, 0), "INR"), true,
        );
        let view = OrderView::new(order.clone(), vec![Some(current), None]);
        assert_eq!(view.id(), order.id());
        assert_eq!(view.product(0).map(Product::name), Some("Widget v2"));
        assert!(view.product(1).is_none());

        let json = serde_json::to_value(&view).unwrap();
        let items = json["items"].as_array().unwrap();
        assert_eq!(items[0]["product"]["offerPrice"]["amount"], "90");
        assert_eq!(items[0]["unitPrice"]["amount"], "100");
        assert_eq!(items[0]["quantity"], 1);
        assert!(items[1]["product"].is_null());

        let plain = serde_json::to_value(&order).unwrap();
        let keys = |v: &serde_json::Value| {
            let mut k: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
            k.sort();
            k
        };
        assert_eq!(keys(&json), keys(&plain));
    }
}

//! In-memory backend, used when no database is configured and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::aggregates::{Cart, CartLine, Order, OrderStatus, Product};
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, UserId};
use crate::store::{CartStore, OrderFilter, OrderSlice, OrderStore, PageRequest, ProductCatalog};
use crate::{EngineError, Result};

/// Each map sits behind its own lock; every trait method takes the lock once,
/// so a read-modify-write of one cart or one order cannot interleave with another.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    carts: RwLock<HashMap<UserId, Cart>>,
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn upsert_product(&self, product: Product) {
        self.products.write().await.insert(product.id(), product);
    }

    pub async fn upsert_products(&self, products: impl IntoIterator<Item = Product>) -> usize {
        let mut map = self.products.write().await;
        let mut count = 0;
        for product in products {
            map.insert(product.id(), product);
            count += 1;
        }
        count
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, owner: &UserId) -> Result<Cart> {
        Ok(self.carts.read().await.get(owner).cloned().unwrap_or_else(|| Cart::new(owner.clone())))
    }

    async fn add_line(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<Quantity> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(owner.clone()).or_insert_with(|| Cart::new(owner.clone()));
        Ok(cart.add_item(product_id, quantity))
    }

    async fn set_line_quantity(&self, owner: &UserId, product_id: ProductId, quantity: Quantity) -> Result<bool> {
        let mut carts = self.carts.write().await;
        Ok(carts.get_mut(owner).is_some_and(|cart| cart.set_quantity(product_id, quantity).is_ok()))
    }

    async fn remove_line(&self, owner: &UserId, product_id: ProductId) -> Result<bool> {
        let mut carts = self.carts.write().await;
        Ok(carts.get_mut(owner).is_some_and(|cart| cart.remove_item(product_id)))
    }

    async fn clear_cart(&self, owner: &UserId) -> Result<()> {
        if let Some(cart) = self.carts.write().await.get_mut(owner) {
            cart.clear();
        }
        Ok(())
    }

    async fn remove_lines(&self, owner: &UserId, lines: &[CartLine]) -> Result<()> {
        if let Some(cart) = self.carts.write().await.get_mut(owner) {
            for line in lines {
                cart.take_units(line.product_id, line.quantity);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(EngineError::StorageError(format!("duplicate order id {}", order.id())));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order, expected_version: u64) -> Result<()> {
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&order.id()).ok_or_else(|| EngineError::NotFound(format!("Order {}", order.id())))?;
        if stored.version() != expected_version {
            return Err(EngineError::Conflict(order.id()));
        }
        *stored = order.clone();
        Ok(())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Option<PageRequest>) -> Result<OrderSlice> {
        let orders = self.orders.read().await;
        let mut matching: Vec<&Order> = orders.values().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        let total = matching.len() as u64;
        let selected = match page {
            Some(p) => matching
                .into_iter()
                .skip(usize::try_from(p.offset()).unwrap_or(usize::MAX))
                .take(p.limit as usize)
                .cloned()
                .collect(),
            None => matching.into_iter().cloned().collect(),
        };
        Ok(OrderSlice { orders: selected, total })
    }

    async fn count_by_status(&self) -> Result<Vec<(OrderStatus, u64)>> {
        let orders = self.orders.read().await;
        let mut counts: HashMap<OrderStatus, u64> = HashMap::new();
        for order in orders.values() {
            *counts.entry(order.status()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn revenue(&self, statuses: &[OrderStatus], currency: &str) -> Result<Money> {
        let orders = self.orders.read().await;
        let mut sum = Money::zero(currency);
        for order in orders.values().filter(|o| statuses.contains(&o.status())) {
            sum = sum.add(order.total())?;
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::domain::aggregates::{NewOrder, TransitionPolicy};
    use crate::test_support::{address, cod_order};

    #[tokio::test]
    async fn test_unknown_owner_gets_empty_cart() {
        let store = MemoryStore::new();
        let cart = store.load_cart(&UserId::new("nobody")).await.unwrap();
        assert!(cart.is_empty());
        assert!(!store.set_line_quantity(&UserId::new("nobody"), ProductId::generate(), Quantity::new(1).unwrap()).await.unwrap());
        assert!(!store.remove_line(&UserId::new("nobody"), ProductId::generate()).await.unwrap());
        store.clear_cart(&UserId::new("nobody")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_increments() {
        let store = Arc::new(MemoryStore::new());
        let owner = UserId::new("u1");
        let product = ProductId::generate();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store.add_line(&owner, product, Quantity::new(1).unwrap()).await.unwrap();
            }));
        }
        for h in handles { h.await.unwrap(); }
        let cart = store.load_cart(&owner).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity.value(), 50);
    }

    #[tokio::test]
    async fn test_remove_lines_subtracts_snapshot_only() {
        let store = MemoryStore::new();
        let owner = UserId::new("u1");
        let (a, b) = (ProductId::generate(), ProductId::generate());
        store.add_line(&owner, a, Quantity::new(2).unwrap()).await.unwrap();
        store.add_line(&owner, b, Quantity::new(1).unwrap()).await.unwrap();
        let snapshot = store.load_cart(&owner).await.unwrap().lines().to_vec();

        store.add_line(&owner, a, Quantity::new(3).unwrap()).await.unwrap();
        store.remove_lines(&owner, &snapshot).await.unwrap();

        let cart = store.load_cart(&owner).await.unwrap();
        assert_eq!(cart.lines(), &[CartLine { product_id: a, quantity: Quantity::new(3).unwrap() }]);
        store.remove_lines(&UserId::new("nobody"), &snapshot).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        let order = cod_order("buyer-1", 100, 1);
        store.insert_order(&order).await.unwrap();

        let mut first = store.find_order(order.id()).await.unwrap().unwrap();
        let mut second = store.find_order(order.id()).await.unwrap().unwrap();

        first.advance_to(OrderStatus::Confirmed, TransitionPolicy::Permissive).unwrap();
        let expected = first.bump_version();
        store.update_order(&first, expected).await.unwrap();

        second.advance_to(OrderStatus::Cancelled, TransitionPolicy::Permissive).unwrap();
        let expected = second.bump_version();
        let err = store.update_order(&second, expected).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(id) if id == order.id()));

        let stored = store.find_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Confirmed);
        assert_eq!(stored.tracking().updates.len(), 2);
        assert_eq!(stored.version(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let store = MemoryStore::new();
        let order = cod_order("buyer-1", 100, 1);
        assert!(matches!(store.update_order(&order, 0).await, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages_newest_first() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let order = Order::place(NewOrder {
                owner: UserId::new(if i % 2 == 0 { "even" } else { "odd" }),
                items: cod_order("x", 100, 1).items().to_vec(),
                shipping_address: address(), payment_method: Default::default(), notes: None, currency: "INR".into(),
            }).unwrap();
            ids.push(order.id());
            store.insert_order(&order).await.unwrap();
        }
        let all = store.list_orders(&OrderFilter::default(), None).await.unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.orders.first().unwrap().id(), *ids.last().unwrap());

        let filter = OrderFilter { owner: Some(UserId::new("even")), status: None };
        let page = store.list_orders(&filter, Some(PageRequest::new(Some(2), Some(2)))).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].id(), ids[0]);
    }

    #[tokio::test]
    async fn test_revenue_sums_selected_statuses() {
        let store = MemoryStore::new();
        let mut shipped = cod_order("b", 300, 2); // 612
        shipped.advance_to(OrderStatus::Shipped, TransitionPolicy::Permissive).unwrap();
        let pending = cod_order("b", 100, 1); // 152
        store.insert_order(&shipped).await.unwrap();
        store.insert_order(&pending).await.unwrap();
        let revenue = store.revenue(&[OrderStatus::Shipped, OrderStatus::Delivered], "INR").await.unwrap();
        assert_eq!(revenue.amount(), rust_decimal::Decimal::new(612, 0));
        let mut counts = store.count_by_status().await.unwrap();
        counts.sort_by_key(|(s, _)| s.as_str());
        assert_eq!(counts, vec![(OrderStatus::Pending, 1), (OrderStatus::Shipped, 1)]);
    }
}

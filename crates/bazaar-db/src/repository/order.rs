//! # Order Repository
//!
//! Checkout turns a cart into an order in one write scope, and order
//! status updates follow the transition graph in `bazaar_core::status`.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          checkout(user, address, method)                │
//! │                                                                         │
//! │  validate method ──► WriteScope::begin                                 │
//! │                          │                                              │
//! │                          ├─ address owned by user?   else InvalidAddress│
//! │                          ├─ cart lines + live prices  else EmptyCart    │
//! │                          ├─ INSERT orders (total = Σ final × qty)       │
//! │                          ├─ for each line, oldest first:                │
//! │                          │     InventoryLedger::reserve   else          │
//! │                          │        InsufficientStock                     │
//! │                          │     INSERT order_items (price frozen)        │
//! │                          ├─ DELETE cart                                 │
//! │                          └─ COMMIT                                      │
//! │                                                                         │
//! │  Any error, or the request deadline, drops the scope: nothing of the   │
//! │  order exists, stock and cart are as they were.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::pricing::{final_price, order_total};
use bazaar_core::validation::validate_payment_method;
use bazaar_core::{
    AddressId, CheckoutReceipt, CoreError, InventoryKey, Money, Order, OrderDetail, OrderId,
    OrderLine, OrderStatus, PaymentStatus, StatusUpdate, UserId,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::inventory::InventoryLedger;
use crate::error::{DbError, DbResult};
use crate::tx::{with_deadline, WriteScope};

const ORDER_COLUMNS: &str = r#"
    id, reference, user_id, address_id, total, payment_method,
    payment_status, order_status, created_at, updated_at
"#;

/// A cart line priced at the moment of checkout.
#[derive(Debug, sqlx::FromRow)]
struct PricedLine {
    product_id: i64,
    color_id: i64,
    size_id: i64,
    quantity: i64,
    base_price_cents: i64,
    discount_bps: u32,
}

impl PricedLine {
    fn key(&self) -> InventoryKey {
        InventoryKey::new(self.product_id, self.color_id, self.size_id)
    }

    fn unit_price(&self) -> Money {
        final_price(Money::from_cents(self.base_price_cents), self.discount_bps)
    }
}

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    request_timeout: Duration,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, request_timeout: Duration) -> Self {
        OrderRepository {
            pool,
            request_timeout,
        }
    }

    /// Converts the user's cart into an order.
    ///
    /// Either the order, its lines, the stock decrements and the emptied
    /// cart are all committed, or none of them are.
    pub async fn checkout(
        &self,
        user_id: UserId,
        address_id: AddressId,
        payment_method: &str,
    ) -> DbResult<CheckoutReceipt> {
        validate_payment_method(payment_method)?;

        with_deadline(
            self.request_timeout,
            "order.checkout",
            place_order(&self.pool, user_id, address_id, payment_method.trim()),
        )
        .await
    }

    /// Gets an order (admin view, any user).
    pub async fn get(&self, order_id: OrderId) -> DbResult<Option<OrderDetail>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(order) => {
                let lines = self.lines(order.id).await?;
                Ok(Some(OrderDetail { order, lines }))
            }
            None => Ok(None),
        }
    }

    /// Gets one of the user's orders. Orders of other users read as absent.
    pub async fn get_for_user(&self, user_id: UserId, order_id: OrderId) -> DbResult<Option<OrderDetail>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND user_id = ?2");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(order) => {
                let lines = self.lines(order.id).await?;
                Ok(Some(OrderDetail { order, lines }))
            }
            None => Ok(None),
        }
    }

    /// Lists the user's orders, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> DbResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY id DESC");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Lines of an order in checkout order.
    pub async fn lines(&self, order_id: OrderId) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, product_id, color_id, size_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Moves an order's fulfilment and/or payment status.
    ///
    /// Setting a status to its current value is a no-op.
    pub async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> DbResult<Order> {
        update.ensure_non_empty()?;

        let mut scope = WriteScope::begin(&self.pool, "order.update_status").await?;

        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(scope.conn())
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        let (order_status, payment_status) =
            update.apply_to(order.order_status, order.payment_status)?;

        if order_status == order.order_status && payment_status == order.payment_status {
            debug!(order_id, "Status update changes nothing");
            return Ok(order);
        }

        let sql = format!(
            "UPDATE orders SET order_status = ?2, payment_status = ?3, updated_at = ?4 \
             WHERE id = ?1 RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(order_status)
            .bind(payment_status)
            .bind(Utc::now())
            .fetch_one(scope.conn())
            .await?;

        scope.commit().await?;

        info!(
            order_id,
            from = %order.order_status,
            to = %updated.order_status,
            payment = %updated.payment_status,
            "Order status updated"
        );
        Ok(updated)
    }
}

async fn place_order(
    pool: &SqlitePool,
    user_id: UserId,
    address_id: AddressId,
    payment_method: &str,
) -> DbResult<CheckoutReceipt> {
    let mut scope = WriteScope::begin(pool, "order.checkout").await?;

    let address_owned: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE id = ?1 AND user_id = ?2)")
            .bind(address_id)
            .bind(user_id)
            .fetch_one(scope.conn())
            .await?;
    if !address_owned {
        return Err(CoreError::InvalidAddress { address_id }.into());
    }

    let lines = priced_cart(scope.conn(), user_id).await?;
    if lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let total = order_total(lines.iter().map(|l| (l.unit_price(), l.quantity)))?;
    let reference = generate_reference();
    let now = Utc::now();

    let order_id: OrderId = sqlx::query_scalar(
        r#"
        INSERT INTO orders (
            reference, user_id, address_id, total, payment_method,
            payment_status, order_status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        RETURNING id
        "#,
    )
    .bind(&reference)
    .bind(user_id)
    .bind(address_id)
    .bind(total)
    .bind(payment_method)
    .bind(PaymentStatus::default())
    .bind(OrderStatus::default())
    .bind(now)
    .fetch_one(scope.conn())
    .await?;

    for line in &lines {
        InventoryLedger::reserve(scope.conn(), line.key(), line.quantity).await?;
        insert_line(scope.conn(), order_id, line).await?;
    }

    sqlx::query("DELETE FROM cart WHERE user_id = ?1")
        .bind(user_id)
        .execute(scope.conn())
        .await?;

    scope.commit().await?;

    info!(
        order_id,
        reference = %reference,
        user_id,
        lines = lines.len(),
        total = %total,
        "Order placed"
    );

    Ok(CheckoutReceipt {
        order_id,
        reference,
        total,
        line_count: lines.len(),
    })
}

async fn priced_cart(conn: &mut SqliteConnection, user_id: UserId) -> DbResult<Vec<PricedLine>> {
    let lines = sqlx::query_as::<_, PricedLine>(
        r#"
        SELECT c.product_id, c.color_id, c.size_id, c.quantity,
               p.base_price_cents, p.discount_bps
        FROM cart c
        JOIN products p ON p.id = c.product_id
        WHERE c.user_id = ?1
        ORDER BY c.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

async fn insert_line(conn: &mut SqliteConnection, order_id: OrderId, line: &PricedLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            order_id, product_id, color_id, size_id, quantity, unit_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.color_id)
    .bind(line.size_id)
    .bind(line.quantity)
    .bind(line.unit_price())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Generates a customer-facing order reference.
///
/// ## Format
/// `ORD-YYYYMMDD-XXXXXXXX`, the suffix being the first eight hex digits of
/// a random UUID.
fn generate_reference() -> String {
    let date_part = Utc::now().format("%Y%m%d");
    let simple = Uuid::new_v4().simple().to_string();
    let suffix: String = simple.chars().take(8).collect();

    format!("ORD-{}-{}", date_part, suffix.to_uppercase())
}

// =============================================================================
// Unit Tests
// =============================================================================

use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::{
        sqlite::SqliteDatabaseError,
        traits::{InsertOrderResult, MarkPaidResult, OrderQueryFilter},
    },
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType, PaymentStatus, TrackingInfo},
};

const ORDER_COLUMNS: &str = "id, order_id, order_number, user_id, customer_email, total_amount, delivery_fee, status, \
                             payment_status, payment_reference, delivery_method, tracking_code, tracking_url, \
                             created_at, updated_at";

pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let result = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(existing) => InsertOrderResult::AlreadyExists(existing),
        None => InsertOrderResult::Inserted(insert_order(order, conn).await?),
    };
    Ok(result)
}

/// Inserts a new order and its items using the given connection. This is not atomic. Embed this call inside a
/// transaction and pass `&mut *tx` as the connection argument.
///
/// If the order has no order number, one is derived from the next row id (see
/// [`order_number_for`](crate::db_types::order_number_for)).
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO orders (
                order_id, order_number, user_id, customer_email, total_amount, delivery_fee, status, payment_status,
                delivery_method, created_at, updated_at
            ) VALUES (
                $1,
                COALESCE($2, printf('SF-%06d', (SELECT COALESCE(MAX(id), 0) + 1 FROM orders))),
                $3, $4, $5, $6, 'pending', 'pending', $7, $8, $8
            );
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.order_number)
    .bind(&order.user_id)
    .bind(&order.customer_email)
    .bind(order.total_amount)
    .bind(order.delivery_fee)
    .bind(&order.delivery_method)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (
                    order_id, product_id, quantity, unit_price, size, color, original_price, discounted_price,
                    savings_amount
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.original_price)
        .bind(item.discounted_price)
        .bind(item.savings_amount)
        .execute(&mut *conn)
        .await?;
    }
    trace!("🗃️ Order {} inserted with {} items", order.order_id, order.items.len());
    fetch_order_by_order_id(&order.order_id, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::OrderVanished(order.order_id.to_string()))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
            SELECT id, order_id, product_id, quantity, unit_price, size, color, original_price, discounted_price,
                   savings_amount
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(reference) = query.payment_reference {
        where_clause.push("payment_reference = ");
        where_clause.push_bind_unseparated(reference);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if !query.payment_statuses.is_empty() {
        where_clause.push("payment_status IN (");
        for (i, status) in query.payment_statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// The reconciliation write. The `WHERE` clause is the entire concurrency story: SQLite serialises writers, and only
/// one of any number of racing callers can find the row still unpaid.
pub(crate) async fn mark_order_paid(
    order_id: &OrderId,
    reference: &str,
    paid_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<MarkPaidResult>, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders
            SET payment_status = 'paid', payment_reference = $1, status = $2, updated_at = $3
            WHERE order_id = $4
              AND payment_status != 'paid'
              AND status = 'pending'
              AND (payment_reference IS NULL OR payment_reference = $1)
        "#,
    )
    .bind(reference)
    .bind(paid_status)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .execute(&mut *conn)
    .await;
    let rows_affected = match result {
        Ok(r) => r.rows_affected(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!("🗃️ Reference {reference} is already recorded against another order");
            return Ok(fetch_order_by_order_id(order_id, conn).await?.map(MarkPaidResult::ReferenceInUse));
        },
        Err(e) => return Err(e.into()),
    };
    let Some(order) = fetch_order_by_order_id(order_id, conn).await? else {
        return Ok(None);
    };
    if rows_affected == 1 {
        debug!("🗃️ Order {order_id} marked as paid with reference {reference}");
        return Ok(Some(MarkPaidResult::Transitioned(order)));
    }
    let result = match order.payment_reference.clone() {
        Some(existing) if existing == reference && order.payment_status == PaymentStatus::Paid => {
            MarkPaidResult::AlreadyPaid(order)
        },
        _ if order.payment_status != PaymentStatus::Paid && order.status != OrderStatusType::Pending => {
            debug!("🗃️ Order {order_id} is {} and can no longer be paid", order.status);
            MarkPaidResult::NotPayable(order)
        },
        Some(existing) => MarkPaidResult::ReferenceConflict { order, existing_reference: existing },
        // A paid order always carries a reference while the check constraint holds
        None => {
            return Err(SqliteDatabaseError::QueryError(format!(
                "Order {order_id} could not be marked as paid, but carries no payment reference"
            )))
        },
    };
    Ok(Some(result))
}

/// Conditionally moves an order between two statuses. Returns `None` if the order is no longer in the `from` state.
pub(crate) async fn update_order_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    tracking: Option<TrackingInfo>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(tracking) = tracking.filter(|t| !t.is_empty()) {
        if let Some(code) = tracking.tracking_code {
            builder.push(", tracking_code = ");
            builder.push_bind(code);
        }
        if let Some(url) = tracking.tracking_url {
            builder.push(", tracking_url = ");
            builder.push_bind(url);
        }
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status = ");
    builder.push_bind(from);
    let rows = builder.build().execute(&mut *conn).await?.rows_affected();
    if rows == 0 {
        debug!("🗃️ Order {order_id} was not in status {from}. No update was made.");
        return Ok(None);
    }
    trace!("🗃️ Order {order_id} moved from {from} to {to}");
    fetch_order_by_order_id(order_id, conn).await
}

use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType},
    traits::StoreError,
};

/// Inserts a new order and its line items using the given connection. This is not atomic. Embed this call inside a
/// transaction, passing `&mut tx` as the connection argument, so that an order is never visible without its items.
///
/// A second order for the same `(user_id, session_id)` fails on the `orders_user_session` unique index and is
/// reported as [`StoreError::DuplicateKey`].
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let NewOrder { order_id, user_id, items, shipping_address: addr, payment_method, payment, totals, status } =
        order;
    let row: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                shipping_full_name,
                shipping_line1,
                shipping_line2,
                shipping_city,
                shipping_state,
                shipping_postal_code,
                shipping_country,
                shipping_phone,
                payment_method,
                transaction_id,
                card_brand,
                card_last4,
                session_id,
                subtotal,
                tax,
                shipping,
                total,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(user_id)
    .bind(addr.full_name)
    .bind(addr.line1)
    .bind(addr.line2)
    .bind(addr.city)
    .bind(addr.state)
    .bind(addr.postal_code)
    .bind(addr.country)
    .bind(addr.phone)
    .bind(payment_method.to_string())
    .bind(payment.transaction_id)
    .bind(payment.card_brand)
    .bind(payment.card_last4)
    .bind(payment.session_id)
    .bind(totals.subtotal.value())
    .bind(totals.tax.value())
    .bind(totals.shipping.value())
    .bind(totals.total.value())
    .bind(status.to_string())
    .fetch_one(&mut *conn)
    .await?;
    let mut line_items = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let line: LineItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, position, product_id, name, unit_price, quantity, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, product_id, name, unit_price, quantity, image_url;
            "#,
        )
        .bind(row.id)
        .bind(position as i64)
        .bind(item.product_id)
        .bind(item.name)
        .bind(item.unit_price.value())
        .bind(item.quantity)
        .bind(item.image_url)
        .fetch_one(&mut *conn)
        .await?;
        line_items.push(line);
    }
    debug!("📝️ Order [{}] inserted with id {} and {} items", row.order_id, row.id, line_items.len());
    Ok(row.with_items(line_items))
}

pub async fn fetch_line_items(id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as(
        "SELECT id, product_id, name, unit_price, quantity, image_url FROM order_items WHERE order_id = $1 ORDER BY \
         position",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

async fn with_line_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(order) => {
            let items = fetch_line_items(order.id, conn).await?;
            Ok(Some(order.with_items(items)))
        },
        None => Ok(None),
    }
}

/// Returns the order with the given public `order_id`, including its line items.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    with_line_items(order, conn).await
}

pub async fn fetch_order_by_user_and_session(
    user_id: i64,
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 AND session_id = $2")
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_line_items(order, conn).await
}

/// Fetches every order for the user, newest first.
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    trace!("📝️ Fetched {} orders for user #{user_id}", orders.len());
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let items = fetch_line_items(order.id, conn).await?;
        result.push(order.with_items(items));
    }
    Ok(result)
}

/// Compare-and-set on the order status. Returns `None` if no order with `order_id` currently has status `from`.
pub(crate) async fn update_order_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(order_id.as_str())
    .bind(from.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}

pub(crate) async fn cancel_order(
    order_id: &OrderId,
    from: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = 'cancelled',
            cancellation_reason = $1,
            cancelled_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $2 AND status = $3
        RETURNING *"#,
    )
    .bind(reason)
    .bind(order_id.as_str())
    .bind(from.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}

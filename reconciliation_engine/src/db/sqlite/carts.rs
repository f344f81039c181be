use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{CartItem, NewCartItem},
};

pub async fn add_cart_item(item: NewCartItem, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            INSERT INTO cart_items (user_id, product_id, quantity, size, color, added_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(&item.user_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(&item.size)
    .bind(&item.color)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    let id = result.last_insert_rowid();
    trace!("🗃️ Added {} x {} to the cart of {}", item.quantity, item.product_id, item.user_id);
    Ok(id)
}

pub async fn fetch_cart_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT id, user_id, product_id, quantity, size, color, added_at FROM cart_items WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub async fn clear_cart_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let removed = sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(conn).await?;
    Ok(removed.rows_affected())
}

use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{carts, db_url, new_pool, orders, products, SqliteDatabaseError};
use crate::{
    db::traits::{
        CartManagement,
        InsertOrderResult,
        MarkPaidResult,
        OrderManagement,
        OrderQueryFilter,
        PaymentReconciliation,
        ProductCatalog,
        StorefrontDatabase,
    },
    db_types::{CartItem, NewCartItem, NewOrder, Order, OrderId, OrderItem, OrderStatusType, ProductSummary, TrackingInfo},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SF_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool for {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        match &result {
            InsertOrderResult::Inserted(o) => {
                debug!("🗃️ Order {} has been saved in the DB with number {}", o.order_id, o.order_number)
            },
            InsertOrderResult::AlreadyExists(o) => debug!("🗃️ Order {} already exists. Nothing was saved", o.order_id),
        }
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        tracking: Option<TrackingInfo>,
    ) -> Result<Option<Order>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_status(order_id, from, to, tracking, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl PaymentReconciliation for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        reference: &str,
        paid_status: OrderStatusType,
    ) -> Result<Option<MarkPaidResult>, Self::Error> {
        // The UPDATE is the first statement, so the transaction takes the write lock straight away and never has to
        // upgrade from a read lock.
        let mut tx = self.pool.begin().await?;
        let result = orders::mark_order_paid(order_id, reference, paid_status, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }
}

impl CartManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn add_cart_item(&self, item: NewCartItem) -> Result<i64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        carts::add_cart_item(item, &mut conn).await
    }

    async fn fetch_cart_for_user(&self, user_id: &str) -> Result<Vec<CartItem>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_cart_for_user(user_id, &mut conn).await
    }

    async fn clear_cart_for_user(&self, user_id: &str) -> Result<u64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let removed = carts::clear_cart_for_user(user_id, &mut conn).await?;
        debug!("🗃️ Removed {removed} items from the cart of {user_id}");
        Ok(removed)
    }
}

impl ProductCatalog for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_product_summaries(&self, product_ids: &[String]) -> Result<Vec<ProductSummary>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_summaries(product_ids, &mut conn).await
    }

    async fn upsert_product(&self, product: ProductSummary) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(product, &mut conn).await
    }
}

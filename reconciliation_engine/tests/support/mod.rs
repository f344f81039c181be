#![allow(dead_code)]
use log::*;
use pay_common::Cents;
use reconciliation_engine::{
    db_types::{NewCartItem, NewOrder, NewOrderItem, ProductSummary},
    events::EventProducers,
    CartManagement,
    MemoryMailer,
    OrderManagement,
    ProductCatalog,
    ReconciliationApi,
    SqliteDatabase,
    StorefrontDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    format!("sqlite://{}/storefront_it_{:016x}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// Creates a fresh, migrated database and returns a handle to it.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn setup() -> (ReconciliationApi<SqliteDatabase, MemoryMailer>, MemoryMailer) {
    setup_with(MemoryMailer::new(), EventProducers::default()).await
}

pub async fn setup_with(
    mailer: MemoryMailer,
    producers: EventProducers,
) -> (ReconciliationApi<SqliteDatabase, MemoryMailer>, MemoryMailer) {
    let db = prepare_test_env(&random_db_path()).await;
    let api = ReconciliationApi::new(db, mailer.clone(), producers);
    (api, mailer)
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

/// Two shirts at R200.00 and a cap at R50.00, delivered for R50.00. R500.00 in total.
pub fn checkout_order(order_id: &str, user_id: Option<&str>) -> NewOrder {
    let mut order = NewOrder::new(order_id.into(), Cents::from_major(500))
        .with_email("buyer@example.com")
        .with_delivery("courier", Cents::from_major(50))
        .with_item(NewOrderItem::new("sku-shirt", 2, Cents::from_major(200)))
        .with_item(NewOrderItem::new("sku-cap", 1, Cents::from_major(50)));
    if let Some(user) = user_id {
        order = order.for_user(user);
    }
    order
}

/// Seeds the catalogue, fills the cart of `user_id` and places the order for it.
pub async fn seed_checkout(db: &SqliteDatabase, order_id: &str, user_id: &str) {
    db.upsert_product(ProductSummary::new("sku-shirt", "Linen Shirt")).await.expect("Error seeding product");
    db.upsert_product(ProductSummary::new("sku-cap", "Canvas Cap")).await.expect("Error seeding product");
    db.add_cart_item(NewCartItem::new(user_id, "sku-shirt", 2)).await.expect("Error seeding cart");
    db.add_cart_item(NewCartItem::new(user_id, "sku-cap", 1)).await.expect("Error seeding cart");
    db.insert_order(checkout_order(order_id, Some(user_id))).await.expect("Error seeding order");
}

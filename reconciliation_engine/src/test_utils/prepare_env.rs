//! Throwaway databases for tests. Every call to [`random_db_path`] yields a fresh SQLite file in the system temp
//! directory, so tests can run in parallel without sharing state.
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{NewCartItem, NewOrder, NewOrderItem, ProductSummary},
    db::traits::{CartManagement, OrderManagement, ProductCatalog},
    SqliteDatabase,
};
use pay_common::Cents;

/// Creates an empty database at `url` and brings it up to the current schema.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/storefront_test_{:016x}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete for {url}");
    db
}

pub async fn create_database(url: &str) {
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {url}");
}

/// The standard fixture used across the test suites: order `ORD-1001` for user `user-7` totalling R500.00, with
/// two items in that user's cart and both products in the catalogue.
pub async fn seed_checkout(db: &SqliteDatabase) -> NewOrder {
    db.upsert_product(ProductSummary::new("sku-shirt", "Linen Shirt").with_image("https://img.example/shirt.png"))
        .await
        .expect("Error seeding product");
    db.upsert_product(ProductSummary::new("sku-cap", "Canvas Cap")).await.expect("Error seeding product");
    db.add_cart_item(NewCartItem::new("user-7", "sku-shirt", 2)).await.expect("Error seeding cart");
    db.add_cart_item(NewCartItem::new("user-7", "sku-cap", 1)).await.expect("Error seeding cart");
    let order = checkout_order("ORD-1001", "user-7");
    db.insert_order(order.clone()).await.expect("Error seeding order");
    order
}

/// An order for two shirts at R200.00 and a cap at R50.00, delivered for R50.00.
pub fn checkout_order(order_id: &str, user_id: &str) -> NewOrder {
    NewOrder::new(order_id.into(), Cents::from_major(500))
        .for_user(user_id)
        .with_email("buyer@example.com")
        .with_delivery("courier", Cents::from_major(50))
        .with_item(NewOrderItem::new("sku-shirt", 2, Cents::from_major(200)))
        .with_item(NewOrderItem::new("sku-cap", 1, Cents::from_major(50)))
}

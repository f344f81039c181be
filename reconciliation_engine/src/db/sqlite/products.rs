use sqlx::{QueryBuilder, SqliteConnection};

use crate::{db::sqlite::SqliteDatabaseError, db_types::ProductSummary};

pub async fn fetch_product_summaries(
    product_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductSummary>, SqliteDatabaseError> {
    if product_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT id, name, image_url FROM products WHERE id IN (");
    let mut ids = builder.separated(", ");
    for id in product_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");
    let products = builder.build_query_as::<ProductSummary>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn upsert_product(product: ProductSummary, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO products (id, name, image_url) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name, image_url = excluded.image_url
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.image_url)
    .execute(conn)
    .await?;
    Ok(())
}

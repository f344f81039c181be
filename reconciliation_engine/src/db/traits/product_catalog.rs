use crate::db_types::ProductSummary;

#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    type Error: std::error::Error;

    /// Fetches names and images for the given product ids. Unknown ids are silently left out of the result.
    async fn fetch_product_summaries(&self, product_ids: &[String]) -> Result<Vec<ProductSummary>, Self::Error>;

    async fn upsert_product(&self, product: ProductSummary) -> Result<(), Self::Error>;
}

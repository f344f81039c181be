use crate::db_types::{CartItem, NewCartItem};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    type Error: std::error::Error;

    async fn add_cart_item(&self, item: NewCartItem) -> Result<i64, Self::Error>;

    async fn fetch_cart_for_user(&self, user_id: &str) -> Result<Vec<CartItem>, Self::Error>;

    /// Deletes every cart line for the user and returns how many were removed. Clearing an empty cart is not an error.
    async fn clear_cart_for_user(&self, user_id: &str) -> Result<u64, Self::Error>;
}

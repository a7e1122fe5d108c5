use crate::{db_types::User, traits::StoreError};

#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    async fn fetch_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Email lookups are case-insensitive.
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

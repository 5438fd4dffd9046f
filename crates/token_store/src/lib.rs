mod error;
mod jwt;
mod paths;
mod schema;
mod store;

pub use error::TokenStoreError;
pub use jwt::token_expiry;
pub use paths::{default_token_file, token_file};
pub use schema::TokenRecord;
pub use store::TokenStore;

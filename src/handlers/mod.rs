pub mod current_user;
pub mod health;
pub mod social;

pub use current_user::CurrentUser;
pub use health::health_check;
pub use social::{authorize, callback, disconnect_account, list_accounts, sync_account};

pub mod authorization;
pub mod callback;
pub mod connectors;
pub mod pending;
pub mod pkce;
pub mod sync;
pub mod token_cipher;

pub use authorization::{AuthorizationStart, start_authorization};
pub use callback::{
    CallbackContext, CallbackOutcome, CallbackQuery, CallbackStatus, handle_callback,
};
pub use connectors::{ConnectorRegistry, PlatformConnector};
pub use pending::PendingAuthorizationStore;
pub use sync::sync_account;
pub use token_cipher::TokenCipher;

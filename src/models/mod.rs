pub mod platform;
pub mod social_account;

pub use platform::{Platform, UnknownPlatform};
pub use social_account::{NewSocialAccount, SocialAccount, SyncUpdate};

pub mod account;
pub mod auth_policy;
pub mod authentication;

pub use account::AccountService;
pub use auth_policy::AuthPolicy;
pub use authentication::{parse_bearer_token, AuthenticatedIdentity, AuthenticationPipeline};

pub mod session;
pub mod session_memory;
pub mod user;
pub mod user_memory;

pub use session::{PgSessionStore, SessionStore};
pub use session_memory::InMemorySessionStore;
pub use user::{PgUserRepository, UserRepository};
pub use user_memory::InMemoryUserRepository;

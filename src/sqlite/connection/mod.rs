mod core;
mod execute;
mod lifecycle;

pub(crate) use self::core::spawn_locked;
pub use self::core::SqliteConnection;

pub mod address;
pub mod config;
pub mod messages;
pub mod models;
pub mod utils;

pub use self::address::*;
pub use self::config::*;
pub use self::messages::*;
pub use self::models::*;
pub use self::utils::*;

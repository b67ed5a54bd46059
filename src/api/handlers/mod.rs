pub mod health;
pub use self::health::health;

pub mod user_register;
pub use self::user_register::register;

pub mod user_login;
pub use self::user_login::login;

pub mod uploads;
pub use self::uploads::{download, upload};

pub mod rate_limit;
mod utils;

pub mod appointment;
pub mod dispatch;
pub mod enums;
pub mod family_profile;
pub mod medication;
pub mod user;

pub use appointment::*;
pub use dispatch::*;
pub use enums::*;
pub use family_profile::*;
pub use medication::*;
pub use user::*;

mod models;
mod names;
mod privilege;

pub use models::*;
pub use names::*;
pub use privilege::Privilege;

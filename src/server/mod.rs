mod api;
pub mod auth;
pub mod dto;
pub mod response;
mod router;

pub use auth::{PRINCIPAL_HEADER, RequirePrincipal};
pub use router::{AppState, create_router};

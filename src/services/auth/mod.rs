pub mod factory;
pub mod jwt;

pub use factory::build_token_service;
pub use jwt::{TokenService, VerificationFailure};

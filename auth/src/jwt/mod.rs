pub mod claims;
pub mod errors;
pub mod handler;
pub mod purpose;

pub use claims::Claims;
pub use errors::JwtError;
pub use handler::JwtHandler;
pub use purpose::TokenLifetimes;
pub use purpose::TokenPurpose;

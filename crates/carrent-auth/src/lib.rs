//! Authentication for the Carrent booking API
//!
//! Tokens are issued by the marketplace identity service; this crate only
//! validates them and turns the claims into an [`carrent_core::models::Actor`]
//! that is passed explicitly into every booking operation.
//!
//! # Example
//!
//! ```no_run
//! use carrent_auth::{Claims, JwtService};
//! use carrent_core::models::UserRole;
//!
//! let jwt_service = JwtService::new("your-secret-key", 3600);
//! let token = jwt_service.create_token(&Claims::new(42, UserRole::Renter))?;
//! let claims = jwt_service.validate_token(&token)?;
//! assert_eq!(claims.user_id()?, 42);
//! # Ok::<(), carrent_core::error::AppError>(())
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};

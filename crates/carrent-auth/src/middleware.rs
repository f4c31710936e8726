//! Actix-web request extractors for authenticated actors
//!
//! Handlers take [`AuthenticatedUser`] or [`AdminUser`] as arguments; the
//! extractor validates the bearer token against the `JwtService` registered
//! as app data.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use carrent_core::error::AppError;
use carrent_core::models::Actor;
use futures::future::{ready, Ready};
use tracing::{debug, warn};

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let jwt_service = req.app_data::<web::Data<JwtService>>().ok_or_else(|| {
        warn!("JwtService not found in app data");
        AppError::Internal("Authentication service not configured".to_string())
    })?;

    let token = extract_bearer_token(req).ok_or_else(|| {
        debug!("No bearer token in request");
        AppError::InvalidToken("No authentication token provided".to_string())
    })?;

    let claims = jwt_service.validate_token(token)?;
    let actor = claims.actor()?;

    debug!(user_id = actor.id, role = %actor.role, "User authenticated");
    Ok(AuthenticatedUser { actor, claims })
}

/// Any authenticated marketplace user
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub actor: Actor,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn is_admin(&self) -> bool {
        self.actor.is_admin()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(actix_web::Error::from))
    }
}

/// Authenticated user holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req).and_then(|user| {
            if !user.is_admin() {
                warn!(
                    user_id = user.actor.id,
                    role = %user.actor.role,
                    "User attempted admin access without privileges"
                );
                return Err(AppError::Forbidden);
            }
            Ok(AdminUser(user))
        });

        ready(result.map_err(actix_web::Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use carrent_core::models::UserRole;

    fn jwt_service() -> JwtService {
        JwtService::new("test-secret-key-12345", 3600)
    }

    #[actix_web::test]
    async fn test_bearer_token_yields_actor() {
        let service = jwt_service();
        let token = service.create_token(&Claims::new(31, UserRole::Renter)).unwrap();

        let app = test::init_service(App::new().app_data(web::Data::new(service)).route(
            "/test",
            web::get().to(|user: AuthenticatedUser| async move {
                assert_eq!(user.actor(), Actor::renter(31));
                "OK"
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt_service()))
                .route("/test", web::get().to(|_user: AuthenticatedUser| async { "OK" })),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_renter_refused_admin_route() {
        let service = jwt_service();
        let token = service.create_token(&Claims::new(2, UserRole::Renter)).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .route("/admin", web::get().to(|_user: AdminUser| async { "OK" })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

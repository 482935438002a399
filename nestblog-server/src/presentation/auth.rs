use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{web, Error, FromRequest, HttpRequest, HttpResponse};

use crate::infrastructure::jwt::JwtService;

/// Identity of the caller, taken from a verified bearer token. Declaring this
/// as a handler argument is what makes a route require authentication: the
/// request is rejected with 401 before the handler body runs.
pub struct AuthenticatedUser {
    pub user_id: i64,
}

fn unauthorized(message: &str) -> Error {
    InternalError::from_response(
        message.to_string(),
        HttpResponse::Unauthorized().json(serde_json::json!({ "error": message })),
    )
    .into()
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let jwt_service = match req.app_data::<web::Data<Arc<JwtService>>>() {
            Some(service) => service.get_ref().clone(),
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "JWT service not configured",
                )))
            }
        };

        let header = match req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
        {
            Some(header) => header,
            None => return ready(Err(unauthorized("Missing Authorization header"))),
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(token) => token.trim(),
            None => return ready(Err(unauthorized("Invalid Authorization header"))),
        };

        match jwt_service.verify_token(token) {
            Ok(user_id) => ready(Ok(AuthenticatedUser { user_id })),
            Err(_) => ready(Err(unauthorized("Invalid token"))),
        }
    }
}

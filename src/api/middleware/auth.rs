use crate::api::error::ApiError;
use crate::auth::{AuthError, UserResolver};
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
    sync::Arc,
};
use tracing::warn;

/// The authenticated caller, placed in request extensions by [`UserAuth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AuthError::MissingToken.into()),
        )
    }
}

/// Pulls the token from `Authorization: Bearer ...`, falling back to the
/// `access_token` query parameter since browsers cannot set headers on WebSockets.
pub fn bearer_token(req: &ServiceRequest) -> Option<String> {
    if let Some(header_value) = req.headers().get("Authorization") {
        let auth_str = header_value.to_str().ok()?;
        let (scheme, token) = auth_str.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    let params = qstring::QString::from(req.query_string());
    params
        .get("access_token")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn is_public(req: &ServiceRequest) -> bool {
    req.method() == actix_web::http::Method::OPTIONS || req.path() == "/health" || req.path() == "/"
}

pub struct UserAuth;

impl<S, B> Transform<S, ServiceRequest> for UserAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = UserAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(UserAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct UserAuthMiddleware<S> {
    service: Rc<S>,
}

fn reject<B>(req: ServiceRequest, err: ApiError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(err.error_response()).map_into_right_body()
}

impl<S, B> Service<ServiceRequest> for UserAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        if is_public(&req) {
            return Box::pin(async move { srv.call(req).await.map(ServiceResponse::map_into_left_body) });
        }

        let resolver = match req.app_data::<web::Data<Arc<dyn UserResolver>>>() {
            Some(r) => r.get_ref().clone(),
            None => {
                warn!("UserResolver missing in app_data");
                return Box::pin(async move {
                    Ok(reject(req, ApiError::Internal("Configuration error".to_string())))
                });
            }
        };

        let token = bearer_token(&req);

        Box::pin(async move {
            let Some(token) = token else {
                return Ok(reject(req, AuthError::MissingToken.into()));
            };

            match resolver.resolve(&token).await {
                Ok(user_id) => {
                    req.extensions_mut().insert(AuthUser { id: user_id });
                    srv.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    warn!("Rejected request to {}: {}", req.path(), e);
                    Ok(reject(req, e.into()))
                }
            }
        })
    }
}

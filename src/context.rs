use std::future::{ready, Ready};

use actix_web::{self, Error, FromRequest, HttpMessage};
use serde::{Deserialize, Serialize};

use crate::error::Error as AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

/// Identity of the authenticated caller, inserted into request extensions by
/// the JWT middleware.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: i32,
    pub nickname: String,
    pub role: Role,
}

impl FromRequest for UserInfo {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;
    fn from_request(req: &actix_web::HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<Self>() {
            ready(Ok(user.clone()))
        } else {
            ready(Err(AppError::Unauthorized("no identity in request".into()).into()))
        }
    }
}

/// Same as [`UserInfo`] but only extractable for admin sessions. Handlers that
/// take this as a parameter are admin-only; the verifying admin's identity
/// always comes from here, never from the request body.
#[derive(Debug, Clone)]
pub struct AdminInfo(pub UserInfo);

impl FromRequest for AdminInfo {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;
    fn from_request(req: &actix_web::HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<UserInfo>() {
            Some(user) if user.role == Role::Admin => ready(Ok(AdminInfo(user.clone()))),
            Some(_) => ready(Err(AppError::Forbidden("admins only".into()).into())),
            None => ready(Err(AppError::Unauthorized("no identity in request".into()).into())),
        }
    }
}

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::{Service, ServiceRequest, Transform};
use actix_web::error::ErrorUnauthorized;
use actix_web::{Error, HttpMessage};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::context::{Role, UserInfo};

pub static JWT_SECRET: &str = "JWT_SECRET";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claim {
    pub sub: String,
    pub nickname: String,
    pub role: Role,
    pub exp: i64,
}

pub fn gen_token(secret: &[u8], claim: &Claim) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claim, &EncodingKey::from_secret(secret))
}

pub fn verify_token(secret: &[u8], token: &str) -> Result<Claim, jsonwebtoken::errors::Error> {
    decode::<Claim>(token, &DecodingKey::from_secret(secret), &Validation::default()).map(|data| data.claims)
}

pub struct Jwt {
    secret: Vec<u8>,
}

impl Jwt {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for Jwt
where
    S: Service<ServiceRequest> + 'static,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Error = Error;
    type Response = S::Response;
    type Transform = JwtService<S>;
    type InitError = ();
    type Future = Pin<Box<dyn Future<Output = Result<Self::Transform, Self::InitError>>>>;
    fn new_transform(&self, service: S) -> Self::Future {
        let secret = self.secret.clone();
        Box::pin(async move {
            Ok(JwtService {
                secret,
                next_service: service,
            })
        })
    }
}

pub struct JwtService<S> {
    secret: Vec<u8>,
    next_service: S,
}

impl<S> Service<ServiceRequest> for JwtService<S>
where
    S: Service<ServiceRequest>,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    fn poll_ready(&self, ctx: &mut core::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx).map_err(|e| e.into())
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = match req.headers().get("Authorization") {
            Some(h) => h.to_owned(),
            None => return Box::pin(async move { Err(ErrorUnauthorized("no token in header")) }),
        };
        match header.to_str() {
            Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
            Ok(raw) => {
                let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
                match verify_token(&self.secret, token) {
                    Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
                    Ok(claim) => match claim.sub.parse::<i32>() {
                        Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
                        Ok(id) => {
                            req.extensions_mut().insert(UserInfo {
                                id,
                                nickname: claim.nickname,
                                role: claim.role,
                            });
                        }
                    },
                }
            }
        }

        let res_fut = self.next_service.call(req);
        Box::pin(async move {
            let resp = res_fut.await.map_err(|e| e.into())?;
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::ops::Add;

    fn claim_for(id: i32, role: Role) -> Claim {
        Claim {
            sub: id.to_string(),
            nickname: "thabo".into(),
            role,
            exp: chrono::Utc::now().add(chrono::Duration::days(1)).timestamp(),
        }
    }

    #[test]
    fn test_gen_and_verify_token() {
        let secret = b"0123456789";
        let token = gen_token(secret, &claim_for(42, Role::Admin)).unwrap();
        let claim = verify_token(secret, &token).unwrap();
        assert_eq!(claim.sub, "42");
        assert_eq!(claim.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = gen_token(b"secret-a", &claim_for(1, Role::Student)).unwrap();
        assert!(verify_token(b"secret-b", &token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let secret = b"0123456789";
        let claim = Claim {
            sub: "1".into(),
            nickname: "thabo".into(),
            role: Role::Student,
            exp: chrono::Utc::now().timestamp() - 3600,
        };
        let token = gen_token(secret, &claim).unwrap();
        assert!(verify_token(secret, &token).is_err());
    }
}

pub mod application;
pub mod notification;
pub mod payment;

use std::ops::Add;

use actix_web::web::{Data, Json};
use hex::ToHex;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{query_as, PgPool};

use crate::context::Role;
use crate::error::Error;
use crate::middlewares::jwt::{gen_token, Claim, JWT_SECRET};
use crate::models::user::User;

fn hash_password(pass: &str, slt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pass);
    hasher.update(slt);
    hasher.finalize().encode_hex()
}

fn random_salt() -> String {
    let chars = vec![
        '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
        'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ];
    let mut slt = String::new();
    let mut rng = thread_rng();
    for _ in 0..32 {
        let i = rng.gen_range(0..chars.len());
        slt.push(chars[i]);
    }
    slt
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

pub async fn login(Json(Login { username, password }): Json<Login>, db: Data<PgPool>) -> Result<Json<LoginResponse>, Error> {
    let mut conn = db.acquire().await?;
    if let Some(user) = query_as::<_, User>(r#"SELECT * FROM users WHERE phone = $1 OR email = $1"#)
        .bind(&username)
        .fetch_optional(&mut conn)
        .await?
    {
        if hash_password(&password, &user.salt) != user.password {
            return Err(Error::Unauthorized("invalid username or password".into()));
        }
        let claim = Claim {
            sub: user.id.to_string(),
            nickname: user.nickname,
            role: user.role,
            exp: chrono::Utc::now().add(chrono::Duration::days(30)).timestamp(),
        };
        let secret = dotenv::var(JWT_SECRET)?;
        let token = gen_token(secret.as_bytes(), &claim)?;
        return Ok(Json(LoginResponse { success: true, token }));
    }
    Err(Error::Unauthorized("invalid username or password".into()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    nickname: String,
    phone: String,
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub id: i32,
}

pub async fn signup(
    Json(Signup {
        nickname,
        phone,
        email,
        password,
    }): Json<Signup>,
    db: Data<PgPool>,
) -> Result<Json<SignupResponse>, Error> {
    if nickname.trim().is_empty() || password.is_empty() {
        return Err(Error::Validation("nickname and password are required".into()));
    }
    if phone.trim().is_empty() && email.trim().is_empty() {
        return Err(Error::Validation("phone or email is required".into()));
    }
    let slt = random_salt();
    let (id,): (i32,) = query_as("INSERT INTO users (nickname, phone, email, password, salt, role) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id")
        .bind(nickname)
        .bind(phone)
        .bind(email)
        .bind(hash_password(&password, &slt))
        .bind(slt)
        .bind(Role::Student)
        .fetch_one(&mut db.acquire().await?)
        .await?;
    Ok(Json(SignupResponse { success: true, id }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_password_deterministic() {
        assert_eq!(hash_password("secret", "salt"), hash_password("secret", "salt"));
        assert_ne!(hash_password("secret", "salt"), hash_password("secret", "other"));
    }

    #[test]
    fn test_random_salt_length() {
        let a = random_salt();
        let b = random_salt();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}

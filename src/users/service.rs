use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use diesel::prelude::*;

use crate::shared::error::ApiError;
use crate::shared::models::schema::users;
use crate::shared::models::{NewUser, User, UserView};

use super::CreateUserRequest;

pub fn create_user(conn: &mut PgConnection, request: &CreateUserRequest) -> Result<UserView, ApiError> {
    validate_new_user(request)?;

    let password_hash = hash_password(&request.password)?;
    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            email: &request.email,
            username: &request.username,
            password_hash: &password_hash,
        })
        .get_result(conn)
        .map_err(|err| match ApiError::from(err) {
            ApiError::Conflict(_) => {
                ApiError::Conflict("email or username already registered".to_string())
            }
            other => other,
        })?;

    Ok(UserView::from(user))
}

pub fn find_user(conn: &mut PgConnection, id: i32) -> Result<Option<UserView>, ApiError> {
    let user = users::table.find(id).first::<User>(conn).optional()?;
    Ok(user.map(UserView::from))
}

pub fn validate_new_user(request: &CreateUserRequest) -> Result<(), ApiError> {
    if request.email.trim().is_empty() || request.username.trim().is_empty() {
        return Err(ApiError::Validation(
            "email and username must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::data::user_repository::UserRepository;
use crate::domain::user::{LoginUserRequest, RegisterUserRequest, UserResponse};
use crate::domain::DomainError;
use crate::infrastructure::jwt::JwtService;

pub struct AuthService {
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    jwt_service: Arc<JwtService>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_repo,
            jwt_service,
        }
    }

    pub async fn register(
        &self,
        req: RegisterUserRequest,
    ) -> Result<(String, UserResponse), DomainError> {
        if self.user_repo.find_by_username(&req.username).await.is_ok() {
            tracing::warn!("Registration failed: username already exists");
            return Err(DomainError::UserAlreadyExists);
        }
        if self.user_repo.find_by_email(&req.email).await.is_ok() {
            tracing::warn!("Registration failed: email already exists");
            return Err(DomainError::UserAlreadyExists);
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Password hashing failed: {}", e);
                DomainError::InternalError(format!("Password hashing failed: {}", e))
            })?
            .to_string();

        let user = self.user_repo.create(req, password_hash).await?;

        let token = self
            .jwt_service
            .generate_token(user.id, user.username.clone())?;

        tracing::info!(
            "User registered: id={}, username={}",
            user.id,
            user.username
        );

        Ok((token, UserResponse::from(user)))
    }

    pub async fn login(
        &self,
        req: LoginUserRequest,
    ) -> Result<(String, UserResponse), DomainError> {
        let user = self.user_repo.find_by_username(&req.username).await?;

        let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
            tracing::error!("Invalid password hash format: {}", e);
            DomainError::InternalError(format!("Invalid password hash: {}", e))
        })?;

        let argon2 = Argon2::default();
        if argon2
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Invalid password for user {}", user.username);
            return Err(DomainError::InvalidCredentials);
        }

        let token = self
            .jwt_service
            .generate_token(user.id, user.username.clone())?;

        tracing::info!(
            "User logged in: id={}, username={}",
            user.id,
            user.username
        );

        Ok((token, UserResponse::from(user)))
    }
}

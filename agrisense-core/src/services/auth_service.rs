use bcrypt::{hash, verify, DEFAULT_COST};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::database::entities::{auth_tokens, users};
use crate::errors::{AuthError, AuthResult};

/// Registration, login and token lookup
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(password: &str) -> AuthResult<String> {
        if password.is_empty() {
            return Err(AuthError::WeakPassword("Password cannot be empty".into()));
        }

        if password.len() < 8 {
            return Err(AuthError::WeakPassword(
                "Password must be at least 8 characters long".into(),
            ));
        }

        Ok(hash(password, DEFAULT_COST)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
        Ok(verify(password, hash)?)
    }

    /// 32 lowercase hex characters
    pub fn generate_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> AuthResult<()> {
        let invalid = |msg: &str| Err(AuthError::InvalidEmail(msg.to_string()));

        if email.is_empty() {
            return invalid("Email cannot be empty");
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return invalid("Invalid email format: must contain exactly one @");
        }

        let (local_part, domain_part) = (parts[0], parts[1]);
        if local_part.is_empty() {
            return invalid("Invalid email format: local part cannot be empty");
        }
        if domain_part.is_empty() || !domain_part.contains('.') {
            return invalid("Invalid email format: domain must contain a dot");
        }
        if domain_part.starts_with('.') || domain_part.ends_with('.') {
            return invalid("Invalid email format: domain cannot start or end with a dot");
        }
        if email.len() > 254 {
            return invalid("Email is too long");
        }

        Ok(())
    }

    /// Validate username format
    pub fn validate_username(username: &str) -> AuthResult<()> {
        let invalid = |msg: &str| Err(AuthError::InvalidUsername(msg.to_string()));

        if username.is_empty() {
            return invalid("Username cannot be empty");
        }
        if username.len() < 3 {
            return invalid("Username must be at least 3 characters long");
        }
        if username.len() > 50 {
            return invalid("Username is too long (max 50 characters)");
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return invalid("Username can only contain letters, numbers, underscores, and hyphens");
        }

        Ok(())
    }

    /// Create an account and return it with its token
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<(users::Model, String)> {
        let username = username.trim();
        let email = email.trim();
        Self::validate_username(username)?;
        Self::validate_email(email)?;
        let password_hash = Self::hash_password(password)?;

        if self.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let user = users::ActiveModel::new(username.to_string(), email.to_string(), password_hash)
            .insert(&self.db)
            .await?;
        let token = self.get_or_create_token(user.id).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok((user, token))
    }

    /// Check credentials and return the user's token, creating it on first login
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(users::Model, String)> {
        let user = self
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !Self::verify_password(password, &user.password_hash)? {
            tracing::debug!(username = %user.username, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = chrono::Utc::now();
        let mut active: users::ActiveModel = user.into();
        active.last_login_at = Set(Some(now));
        active.updated_at = Set(now);
        let user = active.update(&self.db).await?;

        let token = self.get_or_create_token(user.id).await?;
        Ok((user, token))
    }

    pub async fn get_or_create_token(&self, user_id: i32) -> AuthResult<String> {
        let existing = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        if let Some(token) = existing {
            return Ok(token.key);
        }

        let token = auth_tokens::ActiveModel {
            key: Set(Self::generate_token()),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(token.key)
    }

    /// Resolve a token key to its user
    pub async fn authenticate(&self, key: &str) -> AuthResult<users::Model> {
        let token = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::Key.eq(key))
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        users::Entity::find_by_id(token.user_id)
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    pub async fn find_by_username(&self, username: &str) -> AuthResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    /// Grant or revoke staff rights, which gate alert generation for all users
    pub async fn set_staff(&self, username: &str, is_staff: bool) -> AuthResult<users::Model> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let mut active: users::ActiveModel = user.into();
        active.is_staff = Set(is_staff);
        active.updated_at = Set(chrono::Utc::now());
        Ok(active.update(&self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;

    #[test]
    fn test_password_rules() {
        assert!(matches!(
            AuthService::hash_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        let hashed = AuthService::hash_password("harvest-2025").unwrap();
        assert!(AuthService::verify_password("harvest-2025", &hashed).unwrap());
        assert!(!AuthService::verify_password("harvest-2024", &hashed).unwrap());
    }

    #[test]
    fn test_email_validation() {
        assert!(AuthService::validate_email("farmer@example.com").is_ok());
        assert!(AuthService::validate_email("farmer.example.com").is_err());
        assert!(AuthService::validate_email("farmer@localhost").is_err());
        assert!(AuthService::validate_email("@example.com").is_err());
    }

    #[test]
    fn test_username_validation() {
        assert!(AuthService::validate_username("ram_patil-01").is_ok());
        assert!(AuthService::validate_username("ab").is_err());
        assert!(AuthService::validate_username("ram patil").is_err());
        assert!(AuthService::validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_token_format() {
        let token = AuthService::generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_register_login_and_authenticate() {
        let db = setup_test_db().await.unwrap();
        let service = AuthService::new(db);

        let (user, token) = service
            .register("sita", "sita@example.com", "monsoon-rains")
            .await
            .unwrap();
        assert!(user.last_login_at.is_none());

        let (logged_in, login_token) = service.login("sita", "monsoon-rains").await.unwrap();
        assert_eq!(login_token, token);
        assert!(logged_in.last_login_at.is_some());

        let resolved = service.authenticate(&token).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(matches!(
            service.authenticate("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_and_bad_password() {
        let db = setup_test_db().await.unwrap();
        let service = AuthService::new(db);
        service
            .register("sita", "sita@example.com", "monsoon-rains")
            .await
            .unwrap();

        assert!(matches!(
            service
                .register("sita", "other@example.com", "monsoon-rains")
                .await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            service.login("sita", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("ghost", "monsoon-rains").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}

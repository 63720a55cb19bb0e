// bazaar/src/services/users.rs

use crate::cache::{cached, item_key};
use crate::error::{BazaarError, BazaarResult};
use crate::filters::{ListQuery, Page};
use crate::models::requests::{CreateUserPayload, RegisterPayload, UpdateUserPayload};
use crate::models::{Role, User, UserDto};
use crate::services::catalog::ensure_same_id;
use crate::services::passwords::{hash_password, verify_password};
use crate::services::workdays::WORKDAYS;
use crate::services::ServiceContext;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub const USERS: &str = "users";

const BAD_CREDENTIALS: &str = "invalid email or password";

#[derive(Clone)]
pub struct UserService {
  ctx: Arc<ServiceContext>,
}

impl UserService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<User>> {
    let mut uow = self.ctx.begin().await?;
    uow.users().get_all().await
  }

  #[instrument(name = "UserService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<UserDto>> {
    let page = self.ctx.list(USERS, query, || self.load_all()).await?;
    Ok(page.map(UserDto::from))
  }

  #[instrument(name = "UserService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<UserDto> {
    cached(self.ctx.cache.as_ref(), &item_key(USERS, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .users()
        .find_by_id(id)
        .await?
        .map(UserDto::from)
        .ok_or_else(|| BazaarError::not_found("user", id))
    })
    .await
  }

  /// Full record including the hash. Not cached.
  pub async fn find(&self, id: Uuid) -> BazaarResult<Option<User>> {
    let mut uow = self.ctx.begin().await?;
    uow.users().find_by_id(id).await
  }

  async fn insert(&self, name: &str, email: &str, password: &str, role: Role) -> BazaarResult<UserDto> {
    let password_hash = hash_password(password)?;
    let mut uow = self.ctx.begin().await?;
    if uow.users().find_by_email(email).await?.is_some() {
      return Err(BazaarError::DuplicateData(format!("email '{}' is already registered", email)));
    }
    let user = uow
      .users()
      .create(&User {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email: email.trim().to_lowercase(),
        password_hash,
        role,
        created_at: Utc::now(),
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[USERS]).await;
    info!(user_id = %user.id, role = role.as_str(), "User created.");
    Ok(user.into())
  }

  /// Admin path: any role.
  #[instrument(name = "UserService::create", skip(self, payload), fields(email = %payload.email), err(Display))]
  pub async fn create(&self, payload: CreateUserPayload) -> BazaarResult<UserDto> {
    payload.validate()?;
    self
      .insert(&payload.name, &payload.email, &payload.password, payload.role)
      .await
  }

  /// Self-service sign-up. Always a customer.
  #[instrument(name = "UserService::register", skip(self, payload), fields(email = %payload.email), err(Display))]
  pub async fn register(&self, payload: RegisterPayload) -> BazaarResult<UserDto> {
    payload.validate()?;
    self
      .insert(&payload.name, &payload.email, &payload.password, Role::Customer)
      .await
  }

  /// Changes name and email, and the role when one is given. The password stays.
  #[instrument(name = "UserService::update", skip(self, payload), err(Display))]
  pub async fn update(&self, id: Uuid, payload: UpdateUserPayload) -> BazaarResult<UserDto> {
    ensure_same_id(id, payload.id)?;
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    let current = uow
      .users()
      .find_by_id(id)
      .await?
      .ok_or_else(|| BazaarError::not_found("user", id))?;
    if let Some(other) = uow.users().find_by_email(&payload.email).await? {
      if other.id != id {
        return Err(BazaarError::DuplicateData(format!(
          "email '{}' is already registered",
          payload.email
        )));
      }
    }
    let user = uow
      .users()
      .update(&User {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        role: payload.role.unwrap_or(current.role),
        ..current
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[USERS]).await;
    Ok(user.into())
  }

  /// Refused while the user still has orders. Work days and cart go with the user.
  #[instrument(name = "UserService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let mut uow = self.ctx.begin().await?;
    if !uow.users().delete(id).await? {
      return Err(BazaarError::not_found("user", id));
    }
    uow.commit_changes().await?;
    self.ctx.invalidate(&[USERS, WORKDAYS]).await;
    info!(user_id = %id, "User deleted.");
    Ok(())
  }

  /// Looks the user up by email and checks the password. Unknown email and wrong
  /// password give the same error.
  #[instrument(name = "UserService::authenticate", skip(self, password), err(Display))]
  pub async fn authenticate(&self, email: &str, password: &str) -> BazaarResult<UserDto> {
    let mut uow = self.ctx.begin().await?;
    let user = match uow.users().find_by_email(email.trim()).await? {
      Some(user) => user,
      None => {
        warn!("Login attempt for unknown email.");
        return Err(BazaarError::Unauthorized(BAD_CREDENTIALS.to_string()));
      }
    };
    if !verify_password(&user.password_hash, password)? {
      warn!(user_id = %user.id, "Login attempt with wrong password.");
      return Err(BazaarError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    Ok(user.into())
  }
}

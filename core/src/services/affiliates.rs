// bazaar/src/services/affiliates.rs

use crate::cache::{cached, item_key};
use crate::error::{BazaarError, BazaarResult};
use crate::filters::{ListQuery, Page};
use crate::models::requests::AffiliatePayload;
use crate::models::Affiliate;
use crate::services::catalog::ensure_same_id;
use crate::services::ServiceContext;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

pub const AFFILIATES: &str = "affiliates";

#[derive(Clone)]
pub struct AffiliateService {
  ctx: Arc<ServiceContext>,
}

impl AffiliateService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<Affiliate>> {
    let mut uow = self.ctx.begin().await?;
    uow.affiliates().get_all().await
  }

  #[instrument(name = "AffiliateService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<Affiliate>> {
    self.ctx.list(AFFILIATES, query, || self.load_all()).await
  }

  #[instrument(name = "AffiliateService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<Affiliate> {
    cached(self.ctx.cache.as_ref(), &item_key(AFFILIATES, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .affiliates()
        .find_by_id(id)
        .await?
        .ok_or_else(|| BazaarError::not_found("affiliate", id))
    })
    .await
  }

  #[instrument(name = "AffiliateService::create", skip(self, payload), fields(email = %payload.email), err(Display))]
  pub async fn create(&self, payload: AffiliatePayload) -> BazaarResult<Affiliate> {
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.affiliates().find_by_email(&payload.email).await?.is_some() {
      return Err(BazaarError::DuplicateData(format!("affiliate '{}' already exists", payload.email)));
    }
    let affiliate = uow
      .affiliates()
      .create(&Affiliate {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        points: 0,
        joined_at: Utc::now(),
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[AFFILIATES]).await;
    info!(affiliate_id = %affiliate.id, "Affiliate created.");
    Ok(affiliate)
  }

  /// Points are only changed through [`award_points`](Self::award_points).
  #[instrument(name = "AffiliateService::update", skip(self, payload), err(Display))]
  pub async fn update(&self, id: Uuid, payload: AffiliatePayload) -> BazaarResult<Affiliate> {
    ensure_same_id(id, payload.id)?;
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    let current = uow
      .affiliates()
      .find_by_id(id)
      .await?
      .ok_or_else(|| BazaarError::not_found("affiliate", id))?;
    if let Some(other) = uow.affiliates().find_by_email(&payload.email).await? {
      if other.id != id {
        return Err(BazaarError::DuplicateData(format!("affiliate '{}' already exists", payload.email)));
      }
    }
    let affiliate = uow
      .affiliates()
      .update(&Affiliate {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        ..current
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[AFFILIATES]).await;
    Ok(affiliate)
  }

  #[instrument(name = "AffiliateService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let mut uow = self.ctx.begin().await?;
    if !uow.affiliates().delete(id).await? {
      return Err(BazaarError::not_found("affiliate", id));
    }
    uow.commit_changes().await?;
    self.ctx.invalidate(&[AFFILIATES]).await;
    Ok(())
  }

  /// Adds `delta` (possibly negative) to the balance. The balance never drops
  /// below zero.
  #[instrument(name = "AffiliateService::award_points", skip(self), err(Display))]
  pub async fn award_points(&self, id: Uuid, delta: i64) -> BazaarResult<Affiliate> {
    let mut uow = self.ctx.begin().await?;
    let mut affiliate = uow
      .affiliates()
      .find_by_id(id)
      .await?
      .ok_or_else(|| BazaarError::not_found("affiliate", id))?;
    affiliate.points = affiliate.points.saturating_add(delta).max(0);
    let affiliate = uow.affiliates().update(&affiliate).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[AFFILIATES]).await;
    info!(affiliate_id = %id, delta, points = affiliate.points, "Affiliate points changed.");
    Ok(affiliate)
  }
}

// bazaar/src/services/catalog.rs

use crate::cache::{cached, item_key};
use crate::error::{BazaarError, BazaarResult};
use crate::filters::{ListQuery, Page};
use crate::models::requests::{CategoryPayload, ProductPayload};
use crate::models::{Category, Product};
use crate::services::{update_total_value_and_product_count, ServiceContext};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

pub const CATEGORIES: &str = "categories";
pub const PRODUCTS: &str = "products";

/// Fails with `IncorrectFormat` when a body id disagrees with the path id.
pub(crate) fn ensure_same_id(path_id: Uuid, body_id: Option<Uuid>) -> BazaarResult<()> {
  match body_id {
    Some(body_id) if body_id != path_id => Err(BazaarError::IncorrectFormat(format!(
      "path id {} does not match body id {}",
      path_id, body_id
    ))),
    _ => Ok(()),
  }
}

#[derive(Clone)]
pub struct CategoryService {
  ctx: Arc<ServiceContext>,
}

impl CategoryService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<Category>> {
    let mut uow = self.ctx.begin().await?;
    uow.categories().get_all().await
  }

  #[instrument(name = "CategoryService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<Category>> {
    self.ctx.list(CATEGORIES, query, || self.load_all()).await
  }

  #[instrument(name = "CategoryService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<Category> {
    cached(self.ctx.cache.as_ref(), &item_key(CATEGORIES, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .categories()
        .find_by_id(id)
        .await?
        .ok_or_else(|| BazaarError::not_found("category", id))
    })
    .await
  }

  #[instrument(name = "CategoryService::create", skip(self, payload), fields(name = %payload.name), err(Display))]
  pub async fn create(&self, payload: CategoryPayload) -> BazaarResult<Category> {
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.categories().find_by_name(&payload.name).await?.is_some() {
      return Err(BazaarError::DuplicateData(format!("category '{}' already exists", payload.name)));
    }
    let category = uow
      .categories()
      .create(&Category {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        description: payload.description,
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[CATEGORIES]).await;
    info!(category_id = %category.id, "Category created.");
    Ok(category)
  }

  #[instrument(name = "CategoryService::update", skip(self, payload), err(Display))]
  pub async fn update(&self, id: Uuid, payload: CategoryPayload) -> BazaarResult<Category> {
    ensure_same_id(id, payload.id)?;
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.categories().find_by_id(id).await?.is_none() {
      return Err(BazaarError::not_found("category", id));
    }
    if let Some(other) = uow.categories().find_by_name(&payload.name).await? {
      if other.id != id {
        return Err(BazaarError::DuplicateData(format!("category '{}' already exists", payload.name)));
      }
    }
    let category = uow
      .categories()
      .update(&Category {
        id,
        name: payload.name.trim().to_string(),
        description: payload.description,
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[CATEGORIES]).await;
    Ok(category)
  }

  /// Refused while products still reference the category.
  #[instrument(name = "CategoryService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let mut uow = self.ctx.begin().await?;
    if uow.categories().find_by_id(id).await?.is_none() {
      return Err(BazaarError::not_found("category", id));
    }
    if uow.categories().has_products(id).await? {
      return Err(BazaarError::DomainRule(
        "category cannot be deleted while products belong to it".to_string(),
      ));
    }
    uow.categories().delete(id).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[CATEGORIES]).await;
    info!(category_id = %id, "Category deleted.");
    Ok(())
  }
}

#[derive(Clone)]
pub struct ProductService {
  ctx: Arc<ServiceContext>,
}

impl ProductService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<Product>> {
    let mut uow = self.ctx.begin().await?;
    uow.products().get_all().await
  }

  fn build(id: Uuid, payload: ProductPayload) -> Product {
    Product {
      id,
      name: payload.name.trim().to_string(),
      description: payload.description,
      price: payload.price,
      unit_type: payload.unit_type,
      stock: payload.stock,
      category_id: payload.category_id,
      image_url: payload.image_url,
    }
  }

  #[instrument(name = "ProductService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<Product>> {
    self.ctx.list(PRODUCTS, query, || self.load_all()).await
  }

  #[instrument(name = "ProductService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<Product> {
    cached(self.ctx.cache.as_ref(), &item_key(PRODUCTS, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .products()
        .find_by_id(id)
        .await?
        .ok_or_else(|| BazaarError::not_found("product", id))
    })
    .await
  }

  #[instrument(name = "ProductService::create", skip(self, payload), fields(name = %payload.name), err(Display))]
  pub async fn create(&self, payload: ProductPayload) -> BazaarResult<Product> {
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.categories().find_by_id(payload.category_id).await?.is_none() {
      return Err(BazaarError::not_found("category", payload.category_id));
    }
    let product = uow.products().create(&Self::build(Uuid::new_v4(), payload)).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[PRODUCTS]).await;
    info!(product_id = %product.id, "Product created.");
    Ok(product)
  }

  #[instrument(name = "ProductService::update", skip(self, payload), err(Display))]
  pub async fn update(&self, id: Uuid, payload: ProductPayload) -> BazaarResult<Product> {
    ensure_same_id(id, payload.id)?;
    payload.validate()?;
    let mut uow = self.ctx.begin().await?;
    if uow.products().find_by_id(id).await?.is_none() {
      return Err(BazaarError::not_found("product", id));
    }
    if uow.categories().find_by_id(payload.category_id).await?.is_none() {
      return Err(BazaarError::not_found("category", payload.category_id));
    }
    let product = uow.products().update(&Self::build(id, payload)).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[PRODUCTS]).await;
    Ok(product)
  }

  /// Deletes the product and takes it out of every cart holding it, recomputing
  /// those carts' totals in the same unit of work.
  #[instrument(name = "ProductService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let holders: Vec<Uuid> = {
      let mut uow = self.ctx.begin().await?;
      uow.carts().carts_with_product(id).await?.iter().map(|c| c.user_id).collect()
    };
    // Ordered by user id, so concurrent deletes take the cart locks in the same order.
    let mut guards = Vec::with_capacity(holders.len());
    for user_id in &holders {
      guards.push(self.ctx.cart_locks.lock(*user_id).await);
    }

    let mut uow = self.ctx.begin().await?;
    let carts = uow.carts().carts_with_product(id).await?;
    for cart in &carts {
      uow.carts().delete_line(cart.id, id).await?;
    }
    if !uow.products().delete(id).await? {
      return Err(BazaarError::not_found("product", id));
    }
    for cart in &carts {
      update_total_value_and_product_count(uow.as_mut(), cart.id).await?;
    }
    uow.commit_changes().await?;
    drop(guards);
    self.ctx.invalidate(&[PRODUCTS]).await;
    info!(product_id = %id, carts = carts.len(), "Product deleted.");
    Ok(())
  }
}

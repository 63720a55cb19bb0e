// bazaar/src/services/seed.rs

//! Starter data: a few categories and products plus the default admin account.
//! Runs through the services so it works with either store and can be repeated.

use crate::error::{BazaarError, BazaarResult};
use crate::filters::ListQuery;
use crate::models::requests::{CategoryPayload, CreateUserPayload, ProductPayload};
use crate::models::{Role, UnitType};
use crate::services::Services;
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// What a seeding run actually inserted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
  pub categories: usize,
  pub products: usize,
  pub admin_created: bool,
}

struct SeedProduct {
  name: &'static str,
  description: &'static str,
  /// Price in cents.
  price: i64,
  unit_type: UnitType,
  /// Stock in thousandths.
  stock: i64,
}

const CATALOG: &[(&str, &str, &[SeedProduct])] = &[
  (
    "Fruit",
    "Fresh fruit sold by weight or piece",
    &[
      SeedProduct {
        name: "Apples",
        description: "Red apples",
        price: 349,
        unit_type: UnitType::Kilogram,
        stock: 120_000,
      },
      SeedProduct {
        name: "Pineapple",
        description: "Whole pineapple",
        price: 299,
        unit_type: UnitType::Unit,
        stock: 40_000,
      },
    ],
  ),
  (
    "Bakery",
    "Bread and pastries",
    &[
      SeedProduct {
        name: "Sourdough loaf",
        description: "800 g sourdough bread",
        price: 450,
        unit_type: UnitType::Unit,
        stock: 25_000,
      },
      SeedProduct {
        name: "Croissant",
        description: "Butter croissant",
        price: 135,
        unit_type: UnitType::Unit,
        stock: 60_000,
      },
    ],
  ),
  (
    "Dairy",
    "Milk, cheese and yoghurt",
    &[SeedProduct {
      name: "Gouda",
      description: "Aged gouda cheese",
      price: 1890,
      unit_type: UnitType::Kilogram,
      stock: 15_500,
    }],
  ),
];

#[instrument(name = "seed::seed_database", skip(services, admin_password), err(Display))]
pub async fn seed_database(services: &Services, admin_email: &str, admin_password: &str) -> BazaarResult<SeedSummary> {
  let mut summary = SeedSummary::default();
  let all = ListQuery {
    page_size: Some(100),
    ..ListQuery::default()
  };

  let existing_products: Vec<String> = services
    .products
    .list(&all)
    .await?
    .items
    .into_iter()
    .map(|p| p.name.to_lowercase())
    .collect();

  for (category_name, category_description, products) in CATALOG {
    let category = match services
      .categories
      .create(CategoryPayload {
        id: None,
        name: category_name.to_string(),
        description: category_description.to_string(),
      })
      .await
    {
      Ok(created) => {
        summary.categories += 1;
        created
      }
      Err(BazaarError::DuplicateData(_)) => {
        let found = services
          .categories
          .list(&all)
          .await?
          .items
          .into_iter()
          .find(|c| c.name.eq_ignore_ascii_case(category_name));
        match found {
          Some(category) => category,
          None => continue,
        }
      }
      Err(e) => return Err(e),
    };

    for product in products.iter() {
      if existing_products.contains(&product.name.to_lowercase()) {
        continue;
      }
      services
        .products
        .create(ProductPayload {
          id: None,
          name: product.name.to_string(),
          description: product.description.to_string(),
          price: Decimal::new(product.price, 2),
          unit_type: product.unit_type,
          stock: Decimal::new(product.stock, 3),
          category_id: category.id,
          image_url: None,
        })
        .await?;
      summary.products += 1;
    }
  }

  match services
    .users
    .create(CreateUserPayload {
      name: "Administrator".to_string(),
      email: admin_email.to_string(),
      password: admin_password.to_string(),
      role: Role::Admin,
    })
    .await
  {
    Ok(_) => summary.admin_created = true,
    Err(BazaarError::DuplicateData(_)) => {}
    Err(e) => return Err(e),
  }

  info!(?summary, "Database seeded.");
  Ok(summary)
}

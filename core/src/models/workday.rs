// bazaar/src/models/workday.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One shift of an employee. `ended_at` stays empty while the shift is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkDay {
  pub id: Uuid,
  pub employee_id: Uuid,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
}

impl WorkDay {
  pub fn is_open(&self) -> bool {
    self.ended_at.is_none()
  }
}

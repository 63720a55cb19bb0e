// bazaar/src/services/workdays.rs

use crate::cache::{cached, item_key};
use crate::error::{BazaarError, BazaarResult};
use crate::filters::{ListQuery, Page};
use crate::models::{round2, Role, WorkDay};
use crate::reports::{EmployeeHours, WorkdayReportData};
use crate::services::{day_range, ServiceContext};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const WORKDAYS: &str = "workdays";

#[derive(Clone)]
pub struct WorkDayService {
  ctx: Arc<ServiceContext>,
}

/// Length of a shift in hours. Open shifts run until `now`.
fn shift_hours(workday: &WorkDay, now: DateTime<Utc>) -> Decimal {
  let end = workday.ended_at.unwrap_or(now);
  let seconds = (end - workday.started_at).num_seconds().max(0);
  Decimal::from(seconds) / Decimal::from(3600)
}

impl WorkDayService {
  pub fn new(ctx: Arc<ServiceContext>) -> Self {
    Self { ctx }
  }

  async fn load_all(&self) -> BazaarResult<Vec<WorkDay>> {
    let mut uow = self.ctx.begin().await?;
    uow.workdays().get_all().await
  }

  #[instrument(name = "WorkDayService::list", skip(self), err(Display))]
  pub async fn list(&self, query: &ListQuery) -> BazaarResult<Page<WorkDay>> {
    self.ctx.list(WORKDAYS, query, || self.load_all()).await
  }

  #[instrument(name = "WorkDayService::get", skip(self), err(Display))]
  pub async fn get(&self, id: Uuid) -> BazaarResult<WorkDay> {
    cached(self.ctx.cache.as_ref(), &item_key(WORKDAYS, id), || async {
      let mut uow = self.ctx.begin().await?;
      uow
        .workdays()
        .find_by_id(id)
        .await?
        .ok_or_else(|| BazaarError::not_found("work day", id))
    })
    .await
  }

  /// Opens a shift. Only employees and admins work shifts, one open at a time.
  #[instrument(name = "WorkDayService::start_shift", skip(self), err(Display))]
  pub async fn start_shift(&self, employee_id: Uuid) -> BazaarResult<WorkDay> {
    let mut uow = self.ctx.begin().await?;
    let employee = uow
      .users()
      .find_by_id(employee_id)
      .await?
      .ok_or_else(|| BazaarError::not_found("user", employee_id))?;
    if !matches!(employee.role, Role::Employee | Role::Admin) {
      return Err(BazaarError::DomainRule(format!(
        "only employees can start a shift, '{}' is a {}",
        employee.name,
        employee.role.as_str()
      )));
    }
    if let Some(open) = uow.workdays().find_open_for(employee_id).await? {
      return Err(BazaarError::DomainRule(format!(
        "a shift started at {} is still open",
        open.started_at.to_rfc3339()
      )));
    }
    let workday = uow
      .workdays()
      .create(&WorkDay {
        id: Uuid::new_v4(),
        employee_id,
        started_at: Utc::now(),
        ended_at: None,
      })
      .await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[WORKDAYS]).await;
    info!(workday_id = %workday.id, "Shift started.");
    Ok(workday)
  }

  #[instrument(name = "WorkDayService::end_shift", skip(self), err(Display))]
  pub async fn end_shift(&self, employee_id: Uuid) -> BazaarResult<WorkDay> {
    let mut uow = self.ctx.begin().await?;
    let mut workday = uow
      .workdays()
      .find_open_for(employee_id)
      .await?
      .ok_or_else(|| BazaarError::DomainRule("there is no open shift to end".to_string()))?;
    workday.ended_at = Some(Utc::now());
    let workday = uow.workdays().update(&workday).await?;
    uow.commit_changes().await?;
    self.ctx.invalidate(&[WORKDAYS]).await;
    info!(workday_id = %workday.id, "Shift ended.");
    Ok(workday)
  }

  #[instrument(name = "WorkDayService::delete", skip(self), err(Display))]
  pub async fn delete(&self, id: Uuid) -> BazaarResult<()> {
    let mut uow = self.ctx.begin().await?;
    if !uow.workdays().delete(id).await? {
      return Err(BazaarError::not_found("work day", id));
    }
    uow.commit_changes().await?;
    self.ctx.invalidate(&[WORKDAYS]).await;
    Ok(())
  }

  /// Hours per employee over shifts started between `from` and `to`, both days
  /// inclusive. Employees are ordered by name.
  #[instrument(name = "WorkDayService::workday_report_data", skip(self), err(Display))]
  pub async fn workday_report_data(&self, from: NaiveDate, to: NaiveDate) -> BazaarResult<WorkdayReportData> {
    let (start, end) = day_range(from, to);
    let now = Utc::now();
    let mut uow = self.ctx.begin().await?;
    let workdays = uow.workdays().find_started_between(start, end).await?;

    let mut per_employee: HashMap<Uuid, (usize, Decimal)> = HashMap::new();
    for workday in &workdays {
      let entry = per_employee.entry(workday.employee_id).or_insert((0, Decimal::ZERO));
      entry.0 += 1;
      entry.1 += shift_hours(workday, now);
    }

    let mut employees = Vec::with_capacity(per_employee.len());
    for (employee_id, (shifts, hours)) in per_employee {
      let employee_name = uow
        .users()
        .find_by_id(employee_id)
        .await?
        .map_or_else(|| employee_id.to_string(), |u| u.name);
      employees.push(EmployeeHours {
        employee_id,
        employee_name,
        shifts,
        hours: round2(hours),
      });
    }
    employees.sort_by(|a, b| a.employee_name.cmp(&b.employee_name).then(a.employee_id.cmp(&b.employee_id)));
    let total_hours = round2(employees.iter().map(|e| e.hours).sum());

    Ok(WorkdayReportData {
      from,
      to,
      employees,
      total_hours,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn closed_shift_hours() {
    let started_at = Utc::now() - Duration::hours(5);
    let workday = WorkDay {
      id: Uuid::new_v4(),
      employee_id: Uuid::new_v4(),
      started_at,
      ended_at: Some(started_at + Duration::minutes(90)),
    };
    assert_eq!(shift_hours(&workday, Utc::now()), Decimal::new(15, 1));
  }

  #[test]
  fn open_shift_runs_until_now() {
    let now = Utc::now();
    let workday = WorkDay {
      id: Uuid::new_v4(),
      employee_id: Uuid::new_v4(),
      started_at: now - Duration::hours(2),
      ended_at: None,
    };
    assert_eq!(shift_hours(&workday, now), Decimal::from(2));
  }
}

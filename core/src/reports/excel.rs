// bazaar/src/reports/excel.rs

//! SpreadsheetML 2003 workbook with an Orders and a Work days sheet.

use crate::error::BazaarResult;
use crate::reports::{simulated_delay, status_label, OrderReportData, ReportGenerator, ReportType, WorkdayReportData};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub struct ExcelReportGenerator {
  delay: Duration,
}

impl ExcelReportGenerator {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }
}

enum Cell {
  Text(String),
  Number(String),
}

fn escape_xml(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

fn write_sheet(out: &mut String, name: &str, rows: &[Vec<Cell>]) {
  out.push_str(&format!(" <Worksheet ss:Name=\"{}\">\n  <Table>\n", escape_xml(name)));
  for row in rows {
    out.push_str("   <Row>");
    for cell in row {
      match cell {
        Cell::Text(text) => out.push_str(&format!("<Cell><Data ss:Type=\"String\">{}</Data></Cell>", escape_xml(text))),
        Cell::Number(number) => out.push_str(&format!("<Cell><Data ss:Type=\"Number\">{}</Data></Cell>", number)),
      }
    }
    out.push_str("</Row>\n");
  }
  out.push_str("  </Table>\n </Worksheet>\n");
}

pub fn render_workbook(orders: &OrderReportData, workdays: &WorkdayReportData) -> Vec<u8> {
  let text = |s: &str| Cell::Text(s.to_string());

  let mut order_rows = vec![vec![text("Order"), text("Created at"), text("Status"), text("Lines"), text("Total")]];
  for order in &orders.orders {
    order_rows.push(vec![
      Cell::Text(order.id.to_string()),
      Cell::Text(order.created_at.to_rfc3339()),
      text(status_label(order.status)),
      Cell::Number(order.line_count.to_string()),
      Cell::Number(order.total_value.to_string()),
    ]);
  }
  order_rows.push(vec![text("Total"), text(""), text(""), text(""), Cell::Number(orders.total_value.to_string())]);

  let mut workday_rows = vec![vec![text("Employee"), text("Name"), text("Shifts"), text("Hours")]];
  for employee in &workdays.employees {
    workday_rows.push(vec![
      Cell::Text(employee.employee_id.to_string()),
      Cell::Text(employee.employee_name.clone()),
      Cell::Number(employee.shifts.to_string()),
      Cell::Number(employee.hours.to_string()),
    ]);
  }
  workday_rows.push(vec![text("Total"), text(""), text(""), Cell::Number(workdays.total_hours.to_string())]);

  let mut out = String::from(
    "<?xml version=\"1.0\"?>\n<?mso-application progid=\"Excel.Sheet\"?>\n\
     <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" \
     xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
  );
  write_sheet(&mut out, "Orders", &order_rows);
  write_sheet(&mut out, "Work days", &workday_rows);
  out.push_str("</Workbook>\n");
  out.into_bytes()
}

#[async_trait]
impl ReportGenerator for ExcelReportGenerator {
  fn report_type(&self) -> ReportType {
    ReportType::PosExcel
  }

  fn content_type(&self) -> &'static str {
    "application/vnd.ms-excel"
  }

  fn file_extension(&self) -> &'static str {
    "xml"
  }

  #[instrument(name = "ExcelReportGenerator::generate", skip_all, fields(orders = orders.orders.len()))]
  async fn generate(
    &self,
    orders: &OrderReportData,
    workdays: &WorkdayReportData,
    cancel: &CancellationToken,
  ) -> BazaarResult<Vec<u8>> {
    simulated_delay(self.delay, cancel).await?;
    let document = render_workbook(orders, workdays);
    debug!(bytes = document.len(), "Excel report rendered.");
    Ok(document)
  }
}

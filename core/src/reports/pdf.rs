// bazaar/src/reports/pdf.rs

//! Single-page PDF 1.4 point-of-sale report.

use crate::error::BazaarResult;
use crate::reports::{simulated_delay, status_label, OrderReportData, ReportGenerator, ReportType, WorkdayReportData};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const MAX_LINES: usize = 54;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 13;
const TOP: u32 = 800;
const LEFT: u32 = 50;

pub struct PdfReportGenerator {
  delay: Duration,
}

impl PdfReportGenerator {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }
}

fn escape_text(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '(' | ')' | '\\' => {
        escaped.push('\\');
        escaped.push(ch);
      }
      c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
      _ => escaped.push('?'),
    }
  }
  escaped
}

fn report_lines(orders: &OrderReportData, workdays: &WorkdayReportData) -> Vec<String> {
  let mut lines = vec![
    format!("Point of sale report {} to {}", orders.from, orders.to),
    String::new(),
    format!("Orders: {}   Total value: {}", orders.orders.len(), orders.total_value),
  ];
  for order in &orders.orders {
    lines.push(format!(
      "  {}  {}  {:<10}  {} lines  {}",
      order.created_at.format("%Y-%m-%d %H:%M"),
      order.id,
      status_label(order.status),
      order.line_count,
      order.total_value
    ));
  }
  lines.push(String::new());
  lines.push(format!("Work days   Total hours: {}", workdays.total_hours));
  for employee in &workdays.employees {
    lines.push(format!(
      "  {:<30}  {} shifts  {} h",
      employee.employee_name, employee.shifts, employee.hours
    ));
  }
  if lines.len() > MAX_LINES {
    let hidden = lines.len() - (MAX_LINES - 1);
    lines.truncate(MAX_LINES - 1);
    lines.push(format!("... {} more lines", hidden));
  }
  lines
}

/// Lays out `lines` on one A4 page and returns the complete file.
pub fn render_pdf(lines: &[String]) -> Vec<u8> {
  let mut content = format!("BT\n/F1 {} Tf\n{} TL\n{} {} Td\n", FONT_SIZE, LEADING, LEFT, TOP);
  for line in lines {
    content.push_str(&format!("({}) Tj T*\n", escape_text(line)));
  }
  content.push_str("ET\n");

  let objects = [
    "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
    "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
      .to_string(),
    "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
  ];

  let mut out = String::from("%PDF-1.4\n");
  let mut offsets = Vec::with_capacity(objects.len());
  for (i, body) in objects.iter().enumerate() {
    offsets.push(out.len());
    out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
  }
  let xref_at = out.len();
  out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
  for offset in offsets {
    out.push_str(&format!("{:010} 00000 n \n", offset));
  }
  out.push_str(&format!(
    "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
    objects.len() + 1,
    xref_at
  ));
  out.into_bytes()
}

#[async_trait]
impl ReportGenerator for PdfReportGenerator {
  fn report_type(&self) -> ReportType {
    ReportType::PosPdf
  }

  fn content_type(&self) -> &'static str {
    "application/pdf"
  }

  fn file_extension(&self) -> &'static str {
    "pdf"
  }

  #[instrument(name = "PdfReportGenerator::generate", skip_all, fields(orders = orders.orders.len()))]
  async fn generate(
    &self,
    orders: &OrderReportData,
    workdays: &WorkdayReportData,
    cancel: &CancellationToken,
  ) -> BazaarResult<Vec<u8>> {
    simulated_delay(self.delay, cancel).await?;
    let document = render_pdf(&report_lines(orders, workdays));
    debug!(bytes = document.len(), "PDF report rendered.");
    Ok(document)
  }
}

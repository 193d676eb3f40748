#![allow(dead_code)]

use async_trait::async_trait;
use excelviz::error::{Result, VizError};
use excelviz::saving::Store;
use excelviz::service::ExcelViz;
use excelviz::summary::TextGenerator;
use rust_xlsxwriter::Workbook;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fixture cell.
#[derive(Clone, Copy, Debug)]
pub enum Fx {
    S(&'static str),
    N(f64),
    B(bool),
    E,
}

/// Builds an in-memory `.xlsx` with `headers` in row 0 and `rows` below.
pub fn xlsx(headers: &[&str], rows: &[&[Fx]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        if !header.is_empty() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
    }
    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Fx::S(s) => {
                    sheet.write_string(r, c, *s).unwrap();
                }
                Fx::N(n) => {
                    sheet.write_number(r, c, *n).unwrap();
                }
                Fx::B(b) => {
                    sheet.write_boolean(r, c, *b).unwrap();
                }
                Fx::E => {}
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

/// Month / Sales / Region / Units, six rows.
pub fn sales_workbook() -> Vec<u8> {
    use Fx::*;
    xlsx(
        &["Month", "Sales", "Region", "Units"],
        &[
            &[S("Jan"), N(100.0), S("North"), N(10.0)],
            &[S("Feb"), N(150.0), S("South"), N(12.0)],
            &[S("Mar"), S("abc"), S("North"), N(9.0)],
            &[S("Apr"), N(200.0), S("East"), N(15.0)],
            &[S("May"), S("42"), S("North"), E],
            &[S("Jun"), N(250.0), S("South"), N(20.0)],
        ],
    )
}

/// A workbook with `n` data rows: Id (1..=n) and Value (10 * id).
pub fn numbered_workbook(n: usize) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Id").unwrap();
    sheet.write_string(0, 1, "Value").unwrap();
    for i in 1..=n {
        sheet.write_number(i as u32, 0, i as f64).unwrap();
        sheet.write_number(i as u32, 1, (i * 10) as f64).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

/// A text generator with a scripted answer that records its prompts.
pub struct FakeGenerator {
    pub reply: std::result::Result<String, String>,
    pub delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(FakeGenerator {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(FakeGenerator {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(FakeGenerator {
            reply: Ok("too late".to_string()),
            delay,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(VizError::SummaryGeneration)
    }
}

/// A service over a fresh temporary store.
pub fn service_with(generator: Arc<dyn TextGenerator>) -> (tempfile::TempDir, ExcelViz) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let service = ExcelViz::new(store, generator, Duration::from_millis(200));
    (dir, service)
}

pub fn service() -> (tempfile::TempDir, ExcelViz) {
    service_with(FakeGenerator::answering("Sales rise steadily."))
}

pub const USER: &str = "alice";

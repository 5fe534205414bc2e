// src/main.rs

use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    session_id: String,
    store_mode: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayResponse {
    day: u32,
    weekday: String,
    morning1_start: String,
    morning1_end: String,
    status: String,
    non_workday: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationResponse {
    kind: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimesheetResponse {
    records: Vec<DayResponse>,
    loading: bool,
    store_mode: String,
    can_save: bool,
    notification: Option<NotificationResponse>,
}

async fn print_failure(label: &str, response: Response) -> Result<(), Box<dyn Error>> {
    println!("{} failed with status {}: {}", label, response.status(), response.text().await?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::var("PONTO_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health_response);

    // Test 2: Session status
    println!("\n🔍 Checking session status...");
    let status = client
        .get(format!("{}/status", base_url))
        .send()
        .await?
        .json::<StatusResponse>()
        .await?;
    println!(
        "Session {} in {} mode (user: {})",
        status.session_id,
        status.store_mode,
        status.user_id.as_deref().unwrap_or("-")
    );

    // Test 3: Select February 2024
    println!("\n🔍 Selecting February 2024...");
    let response = client
        .put(format!("{}/api/timesheet/month", base_url))
        .json(&json!({ "year": 2024, "month": 1 }))
        .send()
        .await?;
    if !response.status().is_success() {
        return print_failure("Month selection", response).await;
    }
    let sheet = response.json::<TimesheetResponse>().await?;
    println!("Loaded {} days (loading: {})", sheet.records.len(), sheet.loading);
    if let Some(first) = sheet.records.first() {
        println!("Day {} is a {}", first.day, first.weekday);
    }
    let weekend_days = sheet.records.iter().filter(|d| d.non_workday).count();
    println!("Non-workdays this month: {}", weekend_days);

    // Test 4: Header and entries
    println!("\n🔍 Filling in the header...");
    let response = client
        .patch(format!("{}/api/timesheet/header", base_url))
        .json(&json!({ "serverName": "Servidor de Teste", "cpf": "12345678901", "role": "Motorista" }))
        .send()
        .await?;
    println!("Header response: {}", response.text().await?);

    println!("\n🔍 Typing a morning entry and stamping its end...");
    let day = client
        .put(format!("{}/api/timesheet/days/0/times/morning1Start", base_url))
        .json(&json!({ "value": "07:30" }))
        .send()
        .await?
        .json::<DayResponse>()
        .await?;
    println!("Day 1 start: {}", day.morning1_start);
    let day = client
        .post(format!("{}/api/timesheet/days/0/times/morning1End/now", base_url))
        .send()
        .await?
        .json::<DayResponse>()
        .await?;
    println!("Day 1 end stamped at: {}", day.morning1_end);

    println!("\n🔍 Marking day 5 as an absence...");
    let day = client
        .put(format!("{}/api/timesheet/days/4/status", base_url))
        .json(&json!({ "status": "Falta" }))
        .send()
        .await?
        .json::<DayResponse>()
        .await?;
    println!("Day 5 status: {} (non-workday: {})", day.status, day.non_workday);

    // Test 5: Save
    println!("\n🔍 Saving...");
    let response = client
        .post(format!("{}/api/timesheet/save", base_url))
        .send()
        .await?;
    if response.status().is_success() {
        let sheet = response.json::<TimesheetResponse>().await?;
        if let Some(notification) = sheet.notification {
            println!("[{}] {}", notification.kind, notification.message);
        }
        println!("Store mode: {}, can save: {}", sheet.store_mode, sheet.can_save);
    } else {
        print_failure("Save", response).await?;
    }

    // Test 6: Exports
    for (label, path) in [("PDF", "pdf"), ("CSV", "csv")] {
        println!("\n🔍 Exporting {}...", label);
        let response = client
            .get(format!("{}/api/timesheet/export/{}", base_url, path))
            .send()
            .await?;
        if !response.status().is_success() {
            print_failure(label, response).await?;
            continue;
        }
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let bytes = response.bytes().await?;
        println!("{} export: {} bytes, {}", label, bytes.len(), disposition);
    }

    println!("\n✅ Testing complete!");

    Ok(())
}

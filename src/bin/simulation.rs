//! Incident Simulation Runner
//!
//! Posts randomly generated incidents around fixed city landmarks to a
//! running coordinator and writes a summary report with the success rate.
//!
//! # Usage
//! ```bash
//! ./emergency-response --provider template &
//! ./simulation --scenarios 5 --delay-ms 500
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use rand::prelude::*;
use serde_json::{json, Value};
use tracing::{info, warn};

use emergency_response::config::MapsConfig;
use emergency_response::geo::{create_maps_provider, MapsProvider};
use emergency_response::types::Location;

// ============================================================================
// Scenario data
// ============================================================================

struct Landmark {
    name: &'static str,
    lat: f64,
    lng: f64,
}

const LANDMARKS: &[Landmark] = &[
    Landmark { name: "Central Park", lat: 40.7829, lng: -73.9654 },
    Landmark { name: "Times Square", lat: 40.7484, lng: -73.9857 },
    Landmark { name: "Grand Central", lat: 40.7527, lng: -73.9772 },
    Landmark { name: "Rockefeller Center", lat: 40.7589, lng: -73.9851 },
];

const CHIEF_COMPLAINTS: &[&str] = &[
    "chest pain with left arm radiation",
    "severe shortness of breath",
    "sudden onset severe headache",
    "loss of consciousness",
];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Incident simulation runner for the emergency response coordinator")]
#[command(version)]
struct Args {
    /// Base URL of the coordinator
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,

    /// Number of incidents to submit
    #[arg(short = 'n', long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=1000))]
    scenarios: u32,

    /// Pause between incidents in milliseconds
    #[arg(long, default_value = "2000")]
    delay_ms: u64,

    /// Directory the summary report is written to
    #[arg(long, default_value = "reports")]
    reports_dir: PathBuf,

    /// Enrich locations through the maps provider (none | google)
    #[arg(long, default_value = "none")]
    maps: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

struct ScenarioResult {
    number: u32,
    incident: Value,
    status: Option<u16>,
    body: String,
    elapsed: Duration,
}

impl ScenarioResult {
    fn succeeded(&self) -> bool {
        self.status == Some(200)
    }
}

// ============================================================================
// Generation
// ============================================================================

async fn generate_incident(rng: &mut StdRng, maps: &dyn MapsProvider) -> Value {
    let Some(landmark) = LANDMARKS.choose(rng) else {
        return Value::Null;
    };
    let Some(complaint) = CHIEF_COMPLAINTS.choose(rng) else {
        return Value::Null;
    };
    let location = Location::new(landmark.lat, landmark.lng);

    let description = match maps.reverse_geocode(&location).await {
        Ok(Some(details)) => details.formatted_address,
        Ok(None) => landmark.name.to_string(),
        Err(e) => {
            warn!(landmark = landmark.name, error = %e, "Reverse geocoding failed");
            landmark.name.to_string()
        }
    };

    json!({
        "patient_age": rng.gen_range(25..=85),
        "patient_gender": if rng.gen_bool(0.5) { "male" } else { "female" },
        "chief_complaint": complaint,
        "location": {
            "lat": landmark.lat,
            "lng": landmark.lng,
            "description": description,
        },
        "vitals": {
            "heart_rate": rng.gen_range(60..=130),
            "blood_pressure_systolic": rng.gen_range(100..=180),
            "blood_pressure_diastolic": rng.gen_range(60..=100),
            "spo2": rng.gen_range(88..=100),
            "respiratory_rate": rng.gen_range(12..=24),
        }
    })
}

// ============================================================================
// HTTP
// ============================================================================

async fn check_health(client: &reqwest::Client, base_url: &str) -> Result<()> {
    let response = client
        .get(format!("{base_url}/"))
        .send()
        .await
        .with_context(|| format!("Could not connect to {base_url}; is the coordinator running?"))?;
    if !response.status().is_success() {
        bail!("Health check returned {}", response.status());
    }
    let body: Value = response.json().await.context("Health check body is not JSON")?;
    info!(status = %body["status"], version = %body["version"], "API healthy");
    Ok(())
}

async fn submit(client: &reqwest::Client, base_url: &str, number: u32, incident: Value) -> ScenarioResult {
    let started = Instant::now();
    let outcome = client
        .post(format!("{base_url}/incidents/"))
        .json(&incident)
        .send()
        .await;

    let (status, body) = match outcome {
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            (Some(status), body)
        }
        Err(e) => (None, e.to_string()),
    };

    let result = ScenarioResult {
        number,
        incident,
        status,
        body,
        elapsed: started.elapsed(),
    };
    if result.succeeded() {
        info!(scenario = number, elapsed_ms = result.elapsed.as_millis() as u64, "Scenario succeeded");
    } else {
        warn!(scenario = number, status = ?result.status, body = %result.body, "Scenario failed");
    }
    result
}

// ============================================================================
// Summary
// ============================================================================

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render_summary(results: &[ScenarioResult], total_runtime: Duration) -> String {
    let succeeded = results.iter().filter(|r| r.succeeded()).count();
    let total = results.len();
    let rule = "=".repeat(50);

    let mut out = format!(
        "=== Emergency Response System Simulation Summary ===
Time: {time}
Total Scenarios: {total}
Successful Scenarios: {succeeded}
Failed Scenarios: {failed}

Detailed Results:
",
        time = Local::now().format("%Y-%m-%d %H:%M:%S"),
        failed = total - succeeded,
    );

    for r in results {
        out.push_str(&format!(
            "\n{rule}\nScenario {}:\n\nIncident Data:\n{}\n\nStatus: {}\nElapsed: {} ms\n",
            r.number,
            pretty(&r.incident),
            if r.succeeded() { "success" } else { "failed" },
            r.elapsed.as_millis()
        ));
        if r.succeeded() {
            let data: Value = serde_json::from_str(&r.body).unwrap_or(Value::Null);
            out.push_str(&format!("\nResponse Data:\n{}\n", pretty(&data)));
            if let Some(path) = data["report_path"].as_str() {
                out.push_str(&format!("\nReport Generated: {path}\n"));
            }
        } else {
            let code = r.status.map_or_else(|| "N/A".to_string(), |s| s.to_string());
            out.push_str(&format!(
                "\nError Details:\nResponse Code: {code}\nError Message: {}\n",
                r.body
            ));
        }
    }

    let rate = if total == 0 {
        0.0
    } else {
        succeeded as f64 / total as f64 * 100.0
    };
    out.push_str(&format!(
        "\n{rule}\n\nSimulation Summary:\nSuccess Rate: {rate:.2}%\nTotal Runtime: {:.1} s\n",
        total_runtime.as_secs_f64()
    ));

    if succeeded < total {
        out.push_str(
            "\nTroubleshooting Tips:
1. Verify that the API server is running and accessible
2. Check API logs for detailed error messages
3. Check the reasoning service key and quota
",
        );
    }
    out
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let base_url = args.base_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    check_health(&client, &base_url).await?;

    let maps: Arc<dyn MapsProvider> = create_maps_provider(&MapsConfig {
        provider: args.maps.clone(),
        ..MapsConfig::default()
    });
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let started = Instant::now();
    let mut results = Vec::with_capacity(args.scenarios as usize);
    for number in 1..=args.scenarios {
        let incident = generate_incident(&mut rng, maps.as_ref()).await;
        results.push(submit(&client, &base_url, number, incident).await);
        if number < args.scenarios {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }

    let summary = render_summary(&results, started.elapsed());
    tokio::fs::create_dir_all(&args.reports_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.reports_dir.display()))?;
    let path = args.reports_dir.join(format!(
        "simulation_summary_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    tokio::fs::write(&path, &summary)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{summary}");
    info!(path = %path.display(), "Simulation summary written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emergency_response::geo::NoMaps;

    fn result(number: u32, status: Option<u16>, body: &str) -> ScenarioResult {
        ScenarioResult {
            number,
            incident: json!({"chief_complaint": "loss of consciousness"}),
            status,
            body: body.to_string(),
            elapsed: Duration::from_millis(120),
        }
    }

    #[tokio::test]
    async fn test_generated_incident_within_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let incident = generate_incident(&mut rng, &NoMaps).await;
            let age = incident["patient_age"].as_u64().unwrap_or_default();
            assert!((25..=85).contains(&age));
            let spo2 = incident["vitals"]["spo2"].as_u64().unwrap_or_default();
            assert!((88..=100).contains(&spo2));
            let complaint = incident["chief_complaint"].as_str().unwrap_or_default();
            assert!(CHIEF_COMPLAINTS.contains(&complaint));
            let description = incident["location"]["description"].as_str().unwrap_or_default();
            assert!(LANDMARKS.iter().any(|l| l.name == description));
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_incidents() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..5 {
            assert_eq!(
                generate_incident(&mut a, &NoMaps).await,
                generate_incident(&mut b, &NoMaps).await
            );
        }
    }

    #[test]
    fn test_summary_all_succeeded() {
        let results = vec![
            result(1, Some(200), r#"{"status":"success","report_path":"reports/a.txt"}"#),
            result(2, Some(200), r#"{"status":"success","report_path":"reports/b.txt"}"#),
        ];
        let summary = render_summary(&results, Duration::from_secs(3));
        assert!(summary.starts_with("=== Emergency Response System Simulation Summary ==="));
        assert!(summary.contains("Total Scenarios: 2"));
        assert!(summary.contains("Success Rate: 100.00%"));
        assert!(summary.contains("Report Generated: reports/b.txt"));
        assert!(!summary.contains("Troubleshooting Tips"));
    }

    #[test]
    fn test_summary_with_failures() {
        let results = vec![
            result(1, Some(200), r#"{"status":"success"}"#),
            result(2, Some(500), "Severity Assessment failed"),
            result(3, None, "connection refused"),
        ];
        let summary = render_summary(&results, Duration::from_secs(1));
        assert!(summary.contains("Failed Scenarios: 2"));
        assert!(summary.contains("Success Rate: 33.33%"));
        assert!(summary.contains("Response Code: 500"));
        assert!(summary.contains("Response Code: N/A"));
        assert!(summary.contains("Troubleshooting Tips"));
    }
}

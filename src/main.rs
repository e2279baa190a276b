//! flood-risk CLI
//!
//! Run a portfolio flood risk analysis from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Full analysis: event, depths, losses, concentration, mortgage pricing
//! flood-risk analyze --input portfolio.json
//!
//! # Override configuration and emit the report as JSON
//! flood-risk analyze --input portfolio.json --config risk.json --format json
//!
//! # Price mortgages on their stated collateral, no flood adjustment
//! flood-risk price --input mortgages.json
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use flood_risk_engine::core::gauge::{FloodThresholds, Gauge, GaugeNetwork, GaugeReading};
use flood_risk_engine::core::geo::GeoPoint;
use flood_risk_engine::core::mortgage::Mortgage;
use flood_risk_engine::core::property::{Property, PropertyType};
use flood_risk_engine::credit::portfolio::PricingPortfolioMetrics;
use flood_risk_engine::credit::pricer::{MortgagePricer, PricingInputs, PricingOutcome, PricingRequest};
use flood_risk_engine::engine::config::RiskConfig;
use flood_risk_engine::engine::orchestrator::PortfolioRiskEngine;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"flood-risk: portfolio flood risk and flood-linked mortgage pricing

USAGE:
    flood-risk <COMMAND> [OPTIONS]

COMMANDS:
    analyze     Run the full flood risk analysis on a portfolio
    price       Price mortgages on their stated property values
    help        Show this message

OPTIONS:
    --input <FILE>      Path to JSON portfolio file
    --config <FILE>     Path to JSON configuration overrides
    --format <FORMAT>   Output format: text (default) or json

LOGGING:
    Set RUST_LOG=info (or debug) for progress and diagnostics.

EXAMPLES:
    flood-risk analyze --input portfolio.json
    flood-risk analyze --input portfolio.json --config risk.json --format json
    flood-risk price --input mortgages.json"#
    );
}

/// JSON schema for one property.
#[derive(serde::Deserialize)]
struct PropertyInput {
    id: String,
    latitude: f64,
    longitude: f64,
    value: String,
    elevation: Option<f64>,
    #[serde(default)]
    floor_level: f64,
    #[serde(default)]
    property_type: Option<String>,
}

#[derive(serde::Deserialize)]
struct GaugeInput {
    id: String,
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: f64,
    alert_level: f64,
    warning_level: f64,
    severe_level: f64,
    historical_high: Option<f64>,
    historical_high_date: Option<NaiveDate>,
}

#[derive(serde::Deserialize)]
struct ReadingInput {
    gauge_id: String,
    timestamp: DateTime<Utc>,
    water_level: f64,
}

#[derive(serde::Deserialize)]
struct MortgageInput {
    id: String,
    property_id: String,
    loan_amount: String,
    annual_rate: f64,
    original_term_months: u32,
    remaining_term_months: u32,
    gross_income: String,
    insurance_rate: Option<f64>,
    recovery_haircut: Option<f64>,
    property_value: Option<String>,
}

#[derive(serde::Deserialize)]
struct PortfolioFile {
    #[serde(default)]
    properties: Vec<PropertyInput>,
    #[serde(default)]
    gauges: Vec<GaugeInput>,
    #[serde(default)]
    readings: Vec<ReadingInput>,
    #[serde(default)]
    mortgages: Vec<MortgageInput>,
}

/// JSON output schema for standalone pricing.
#[derive(serde::Serialize)]
struct PricingOutput {
    mortgages: Vec<PricedMortgageOutput>,
    metrics: PricingPortfolioMetrics,
}

#[derive(serde::Serialize)]
struct PricedMortgageOutput {
    mortgage_id: String,
    fair_value: f64,
    credit_spread: f64,
    discount_percentage: f64,
    ltv_ratio: f64,
    error: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn parse_decimal(field: &str, id: &str, raw: &str) -> Decimal {
    raw.trim().parse().unwrap_or_else(|e| {
        fail(format!("{}: invalid {} '{}': {}", id, field, raw, e));
    })
}

fn load_portfolio(path: &str) -> PortfolioFile {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        fail(format!("reading file '{}': {}", path, e));
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "properties": [
    {{ "id": "P1", "latitude": 51.5, "longitude": -0.12, "value": "350000", "elevation": 8.5 }}
  ],
  "gauges": [
    {{ "id": "G1", "latitude": 51.5, "longitude": -0.12, "elevation": 4.0,
      "alert_level": 1.0, "warning_level": 1.5, "severe_level": 2.2 }}
  ],
  "readings": [
    {{ "gauge_id": "G1", "timestamp": "2024-01-01T00:00:00Z", "water_level": 1.8 }}
  ],
  "mortgages": [
    {{ "id": "M1", "property_id": "P1", "loan_amount": "250000", "annual_rate": 0.045,
      "original_term_months": 300, "remaining_term_months": 240, "gross_income": "70000" }}
  ]
}}"#
        );
        process::exit(1);
    })
}

fn load_config(path: Option<&str>) -> RiskConfig {
    match path {
        None => RiskConfig::default(),
        Some(path) => {
            let content = fs::read_to_string(path).unwrap_or_else(|e| {
                fail(format!("reading config '{}': {}", path, e));
            });
            RiskConfig::from_json(&content).unwrap_or_else(|e| fail(e))
        }
    }
}

fn build_properties(inputs: Vec<PropertyInput>) -> Vec<Property> {
    inputs
        .into_iter()
        .map(|p| {
            let value = parse_decimal("value", &p.id, &p.value);
            let property_type = p
                .property_type
                .as_deref()
                .map(PropertyType::parse_or_default)
                .unwrap_or_default();
            Property::new(p.id, p.latitude, p.longitude, value)
                .and_then(|prop| prop.with_optional_elevation(p.elevation).with_floor_level(p.floor_level))
                .map(|prop| prop.with_property_type(property_type))
                .unwrap_or_else(|e| fail(e))
        })
        .collect()
}

fn build_network(gauges: Vec<GaugeInput>, readings: Vec<ReadingInput>) -> GaugeNetwork {
    let mut network = GaugeNetwork::new();
    for g in gauges {
        let location = match (g.latitude, g.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };
        let thresholds = FloodThresholds::new(g.alert_level, g.warning_level, g.severe_level);
        let mut gauge = Gauge::new(g.id, location, g.elevation, thresholds).unwrap_or_else(|e| fail(e));
        if let Some(name) = g.name {
            gauge = gauge.with_name(name);
        }
        if let Some(level) = g.historical_high {
            gauge = gauge.with_historical_high(level, g.historical_high_date);
        }
        network.add_gauge(gauge);
    }
    for r in readings {
        network.add_reading(GaugeReading::new(r.gauge_id, r.timestamp, r.water_level));
    }
    network
}

fn build_mortgages(inputs: Vec<MortgageInput>) -> Vec<Mortgage> {
    inputs
        .into_iter()
        .map(|m| {
            let loan = parse_decimal("loan_amount", &m.id, &m.loan_amount);
            let income = parse_decimal("gross_income", &m.id, &m.gross_income);
            let stated = m
                .property_value
                .as_deref()
                .map(|v| parse_decimal("property_value", &m.id, v));
            let mut mortgage = Mortgage::new(
                m.id,
                m.property_id,
                loan,
                m.annual_rate,
                m.original_term_months,
                m.remaining_term_months,
                income,
            )
            .unwrap_or_else(|e| fail(e));
            if let Some(rate) = m.insurance_rate {
                mortgage = mortgage.with_insurance_rate(rate).unwrap_or_else(|e| fail(e));
            }
            if let Some(haircut) = m.recovery_haircut {
                mortgage = mortgage.with_recovery_haircut(haircut).unwrap_or_else(|e| fail(e));
            }
            if let Some(value) = stated {
                mortgage = mortgage.with_stated_property_value(value);
            }
            mortgage
        })
        .collect()
}

struct CommonArgs {
    input: String,
    config: Option<String>,
    format: String,
}

fn parse_args(args: &[String]) -> CommonArgs {
    let mut input_path = None;
    let mut config_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    fail("--input requires a file path");
                }));
            }
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    fail("--config requires a file path");
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    fail("--format requires 'text' or 'json'");
                });
                if format != "text" && format != "json" {
                    fail(format!("unknown format '{}'", format));
                }
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    CommonArgs {
        input: input_path.unwrap_or_else(|| fail("--input <FILE> is required")),
        config: config_path,
        format,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(format!("serializing output: {}", e)))
}

fn cmd_analyze(args: &[String]) {
    let args = parse_args(args);
    let config = load_config(args.config.as_deref());
    let file = load_portfolio(&args.input);

    let properties = build_properties(file.properties);
    let network = build_network(file.gauges, file.readings);
    let mortgages = build_mortgages(file.mortgages);

    let engine = PortfolioRiskEngine::new(config).unwrap_or_else(|e| fail(e));
    let report = engine.run(&properties, &network, &mortgages);

    if args.format == "json" {
        println!("{}", to_json(&report));
    } else {
        println!("{}", report);
    }
}

fn cmd_price(args: &[String]) {
    let args = parse_args(args);
    let config = load_config(args.config.as_deref());
    let file = load_portfolio(&args.input);
    let mortgages = build_mortgages(file.mortgages);

    let requests: Vec<PricingRequest> = mortgages
        .iter()
        .map(|m| {
            let collateral = m
                .stated_property_value()
                .and_then(|v| v.to_f64())
                .unwrap_or(0.0);
            PricingRequest {
                mortgage_id: m.id().clone(),
                property_id: m.property_id().clone(),
                flood_impact_ratio: 0.0,
                inputs: PricingInputs::from_mortgage(m, collateral),
            }
        })
        .collect();

    let results = MortgagePricer::new(config.pricing).price_batch(&requests);
    let metrics = PricingPortfolioMetrics::from_results(&results);

    if args.format == "json" {
        let output = PricingOutput {
            mortgages: results
                .iter()
                .map(|r| {
                    let priced = r.outcome.result();
                    PricedMortgageOutput {
                        mortgage_id: r.mortgage_id.to_string(),
                        fair_value: priced.fair_value,
                        credit_spread: priced.credit_spread,
                        discount_percentage: priced.discount_percentage,
                        ltv_ratio: priced.ltv_ratio,
                        error: r.outcome.error().map(str::to_string),
                    }
                })
                .collect(),
            metrics,
        };
        println!("{}", to_json(&output));
    } else {
        for r in &results {
            println!("Mortgage {} (property {})", r.mortgage_id, r.property_id);
            match &r.outcome {
                PricingOutcome::Priced(result) => print!("{}", result),
                PricingOutcome::Fallback { result, error } => {
                    println!("  FALLBACK: {}", error);
                    print!("{}", result);
                }
            }
            println!();
        }
        println!("{}", metrics);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "analyze" => cmd_analyze(&args[2..]),
        "price" => cmd_price(&args[2..]),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(1);
        }
    }
}

//! helio-sim - synthetic PV data and offline analytics driver
//!
//! Usage:
//!   helio-sim generate --panels 10 --days 30 --output telemetry.json
//!   helio-sim analyze --input telemetry.json
//!   helio-sim summary --input telemetry.json --days 30
//!   helio-sim train --location Pune --days 60 --model solar_model.bin
//!   helio-sim predict --model solar_model.bin --days 7
//!   helio-sim simulate --latitude 18.5 --tilt 18 --cleaning Monthly
//!   helio-sim energy --input live.json --model solar_model.bin --irradiance 650

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use helio_core::performance::{
    PerformanceConfig, PerformanceInputs, assess, daylight_hours_elapsed, fleet_summary,
    forecast_output_kwh, forecast_power_mw, summarize_live,
};
use helio_core::{
    AnalyticsConfig, AnomalyScorer, EnergyForecaster, FileModelStore, HealthClassifier,
    LiveReading, ScenarioParams, ScenarioSimulator, TelemetryRecord, WeatherFeatureVector,
    WeatherRecord, derive_panel_power,
};
use helio_sim::{GeneratorConfig, TelemetryGenerator, WeatherConfig, WeatherGenerator};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "helio-sim")]
#[command(about = "Synthetic PV telemetry and offline analytics")]
struct Cli {
    /// Analytics config (JSON); defaults apply to anything not set
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate panel telemetry with injected faults
    Generate {
        #[arg(short, long, default_value = "10")]
        panels: usize,

        #[arg(short, long, default_value = "30")]
        days: u32,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// First day, YYYY-MM-DD
        #[arg(long, default_value = "2025-01-01")]
        start: NaiveDate,

        /// Telemetry output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write injected fault events
        #[arg(long)]
        ground_truth: Option<PathBuf>,
    },

    /// Score telemetry and print per-panel health
    Analyze {
        /// Telemetry JSON array; generated when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Overrides the configured contamination
        #[arg(long)]
        contamination: Option<f64>,

        /// Full report (health + analyzed rows) as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fleet production totals and the daily energy trend
    Summary {
        /// Telemetry JSON array; generated when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Reporting window, also the generated span
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Panels to generate when no input is given
        #[arg(short, long, default_value = "15")]
        panels: usize,
    },

    /// Train the energy model and replace the artifact
    Train {
        #[arg(short, long)]
        location: String,

        /// Weather history JSON array; generated when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Days of generated hourly history
        #[arg(short, long, default_value = "60")]
        days: u32,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = helio_core::store::DEFAULT_MODEL_FILE)]
        model: PathBuf,
    },

    /// Forecast output from weather rows
    Predict {
        #[arg(short, long, default_value = helio_core::store::DEFAULT_MODEL_FILE)]
        model: PathBuf,

        /// Weather JSON array; a generated daily forecast when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "7")]
        days: u32,

        #[arg(long, default_value = "2025-06-01")]
        start: NaiveDate,

        /// Installation capacity, kW
        #[arg(long, default_value = "10")]
        capacity: f64,

        /// Panel efficiency, percent
        #[arg(long, default_value = "20")]
        efficiency: f64,
    },

    /// Estimate annual yield for a planned installation
    Simulate {
        #[arg(long, default_value = "10")]
        panels: u32,

        #[arg(long, default_value = "300")]
        wattage: f64,

        #[arg(long, default_value = "0")]
        tilt: f64,

        #[arg(long, default_value = "0")]
        latitude: f64,

        #[arg(long, default_value = "180")]
        azimuth: f64,

        /// Shading, percent
        #[arg(long, default_value = "0")]
        shading: f64,

        /// Weekly, Monthly, Quarterly or Annually
        #[arg(long, default_value = "Weekly")]
        cleaning: String,

        /// Degradation, percent
        #[arg(long, default_value = "0")]
        degradation: f64,
    },

    /// Compare a live power feed with the model's prediction
    Energy {
        /// Live readings JSON array (timestamp, voltage, current, power, ...)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = helio_core::store::DEFAULT_MODEL_FILE)]
        model: PathBuf,

        #[arg(long, default_value = "25")]
        temperature: f64,

        #[arg(long, default_value = "600")]
        irradiance: f64,

        #[arg(long, default_value = "50")]
        humidity: f64,

        #[arg(long, default_value = "20")]
        cloud_cover: f64,

        /// Energy price per kWh
        #[arg(long, default_value = "8.0")]
        price: f64,

        /// Evaluation time (RFC 3339); now when omitted
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalyticsConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };

    match cli.command {
        Commands::Generate {
            panels,
            days,
            seed,
            start,
            output,
            ground_truth,
        } => run_generate(
            GeneratorConfig {
                num_panels: panels,
                days,
                seed,
                start_date: start,
                ..Default::default()
            },
            output.as_deref(),
            ground_truth.as_deref(),
        ),
        Commands::Analyze {
            input,
            contamination,
            output,
        } => run_analyze(&config, input.as_deref(), contamination, output.as_deref()),
        Commands::Summary {
            input,
            days,
            panels,
        } => run_summary(input.as_deref(), days, panels),
        Commands::Train {
            location,
            input,
            days,
            seed,
            model,
        } => run_train(&config, &location, input.as_deref(), days, seed, model),
        Commands::Predict {
            model,
            input,
            days,
            start,
            capacity,
            efficiency,
        } => run_predict(&config, model, input.as_deref(), days, start, capacity, efficiency),
        Commands::Simulate {
            panels,
            wattage,
            tilt,
            latitude,
            azimuth,
            shading,
            cleaning,
            degradation,
        } => run_simulate(ScenarioParams {
            panel_count: panels,
            panel_wattage: wattage,
            tilt_angle: tilt,
            latitude,
            azimuth,
            shading_factor_percent: shading,
            cleaning_frequency: cleaning.into(),
            degradation_rate_percent: degradation,
        }),
        Commands::Energy {
            input,
            model,
            temperature,
            irradiance,
            humidity,
            cloud_cover,
            price,
            at,
        } => run_energy(
            &config,
            &input,
            model,
            WeatherFeatureVector::new(temperature, irradiance, humidity, cloud_cover),
            price,
            at.unwrap_or_else(Utc::now),
        ),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_generate(
    config: GeneratorConfig,
    output: Option<&Path>,
    ground_truth: Option<&Path>,
) -> Result<()> {
    let batch = TelemetryGenerator::new(config).generate()?;

    eprintln!("Panels with injected faults: {:?}", batch.faulty_panels());
    if let Some(path) = ground_truth {
        write_json(Some(path), &batch.ground_truth)?;
    }
    write_json(output, &batch.records)
}

#[derive(Serialize)]
struct AnalysisOutput<'a> {
    health_report: &'a helio_core::HealthReport,
    analyzed_data: &'a [helio_core::AnalyzedRecord],
}

fn run_analyze(
    config: &AnalyticsConfig,
    input: Option<&Path>,
    contamination: Option<f64>,
    output: Option<&Path>,
) -> Result<()> {
    let records: Vec<TelemetryRecord> = match input {
        Some(path) => read_json(path)?,
        None => {
            TelemetryGenerator::new(GeneratorConfig::default())
                .generate()?
                .records
        }
    };
    let records = derive_panel_power(&records);

    let mut anomaly = config.anomaly.clone();
    if let Some(c) = contamination {
        anomaly.contamination = c;
    }
    let scorer = AnomalyScorer::with_config(anomaly);
    let analyzed = scorer.detect(&records)?;
    let report = HealthClassifier::new(scorer).classify(&analyzed)?;

    println!(
        "{:<12} {:<9} {:>8} {:>10} {:>10} {:>9}",
        "panel", "status", "rate %", "avg out", "out std", "readings"
    );
    for panel in report.by_priority() {
        println!(
            "{:<12} {:<9} {:>8.2} {:>10.2} {:>10.2} {:>9}",
            panel.panel_id,
            format!("{:?}", panel.health_status),
            panel.anomaly_rate_percent,
            panel.avg_output,
            panel.output_stddev,
            panel.total_readings
        );
    }
    if report.is_empty() {
        eprintln!("No health report: fewer than two usable telemetry features");
    }

    if let Some(path) = output {
        write_json(
            Some(path),
            &AnalysisOutput {
                health_report: &report,
                analyzed_data: &analyzed,
            },
        )?;
    }
    Ok(())
}

fn run_summary(input: Option<&Path>, days: u32, panels: usize) -> Result<()> {
    let records: Vec<TelemetryRecord> = match input {
        Some(path) => read_json(path)?,
        None => {
            TelemetryGenerator::new(GeneratorConfig {
                num_panels: panels,
                days,
                ..Default::default()
            })
            .generate()?
            .records
        }
    };
    write_json(None, &fleet_summary(&records, days))
}

fn run_train(
    config: &AnalyticsConfig,
    location: &str,
    input: Option<&Path>,
    days: u32,
    seed: u64,
    model: PathBuf,
) -> Result<()> {
    let history: Vec<WeatherRecord> = match input {
        Some(path) => read_json(path)?,
        None => WeatherGenerator::new(WeatherConfig {
            seed,
            ..Default::default()
        })
        .hourly(days)?,
    };

    let forecaster = EnergyForecaster::new(FileModelStore::new(&model), config.predictor.clone());
    let trained = forecaster
        .retrain(location, &history)
        .with_context(|| format!("Training for {} failed", location))?;

    println!(
        "Trained model for {} on {} rows -> {}",
        trained,
        history.len(),
        model.display()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct ForecastRow {
    timestamp: Option<DateTime<Utc>>,
    prediction: f64,
    predicted_output_kwh: f64,
    predicted_power_mw: f64,
}

fn run_predict(
    config: &AnalyticsConfig,
    model: PathBuf,
    input: Option<&Path>,
    days: u32,
    start: NaiveDate,
    capacity: f64,
    efficiency: f64,
) -> Result<()> {
    let rows: Vec<WeatherRecord> = match input {
        Some(path) => read_json(path)?,
        None => WeatherGenerator::new(WeatherConfig {
            start_date: start,
            ..Default::default()
        })
        .daily(days)?,
    };

    let forecaster = EnergyForecaster::new(FileModelStore::new(model), config.predictor.clone());
    let predictions = forecaster
        .predict_records(&rows)
        .context("Prediction failed; train a model first")?;

    let perf = &config.performance;
    let forecast: Vec<ForecastRow> = rows
        .iter()
        .zip(predictions)
        .map(|(row, prediction)| forecast_row(row, prediction, capacity, efficiency, perf))
        .collect();

    write_json(None, &forecast)
}

/// Output kWh follows the sign of the prediction; only the power figure is floored
fn forecast_row(
    row: &WeatherRecord,
    prediction: f64,
    capacity: f64,
    efficiency: f64,
    perf: &PerformanceConfig,
) -> ForecastRow {
    ForecastRow {
        timestamp: row.timestamp,
        prediction,
        predicted_output_kwh: forecast_output_kwh(prediction, capacity, efficiency, perf),
        predicted_power_mw: forecast_power_mw(prediction, perf),
    }
}

fn run_simulate(params: ScenarioParams) -> Result<()> {
    let estimate = ScenarioSimulator::estimate(&params);
    write_json(None, &estimate)
}

#[derive(Serialize)]
struct EnergyOutput {
    live: helio_core::LiveSummary,
    daylight_hours: f64,
    predicted_power_w: f64,
    assessment: helio_core::Assessment,
}

fn run_energy(
    config: &AnalyticsConfig,
    input: &Path,
    model: PathBuf,
    weather: WeatherFeatureVector,
    price: f64,
    at: DateTime<Utc>,
) -> Result<()> {
    let readings: Vec<LiveReading> = read_json(input)?;
    let perf = &config.performance;
    let live = summarize_live(&readings, perf)?;
    let daylight_hours = daylight_hours_elapsed(at, perf)?;

    let forecaster = EnergyForecaster::new(FileModelStore::new(model), config.predictor.clone());
    let predicted_power_w = forecaster
        .predict(&[weather])
        .context("Prediction failed; train a model first")?
        .first()
        .copied()
        .unwrap_or_default();

    let assessment = assess(
        &PerformanceInputs {
            predicted_power_w,
            latest_power_mw: live.latest_power_mw,
            actual_energy_mwh: live.actual_energy_mwh,
            daylight_hours,
            energy_price: price,
        },
        perf,
    );

    write_json(
        None,
        &EnergyOutput {
            live,
            daylight_hours,
            predicted_power_w,
            assessment,
        },
    )
}

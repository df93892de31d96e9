use std::error::Error as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use tagihan::{
    format_rupiah, BillEstimator, EstimatorError, FeatureSchema, ModelCache, ModelError, RawInput,
    MONTH_CODES, MONTH_GROUP, TARIFF_CLASSES, TARIFF_GROUP,
};

/// Jakarta household electricity bill prediction
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trained model artifact (.json or .onnx); defaults to $TAGIHAN_MODEL_PATH
    /// or linear_regression_model.json
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Refuse to use the model unless its SHA-256 digest matches
    #[arg(long, global = true)]
    sha256: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the bill for one set of parameters
    Predict(InputArgs),
    /// Predict bills for JSON lines of parameters read from a file ("-" for stdin)
    Batch {
        input: PathBuf,
    },
    /// Print the feature layout the model expects
    Schema,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Monthly consumption in kWh (150-600)
    #[arg(long, default_value_t = 350.0)]
    kwh: f64,
    /// Number of air conditioners (0-3)
    #[arg(long, default_value_t = 1)]
    ac_units: i64,
    /// Air conditioner hours per day (0-10)
    #[arg(long = "ac-hours", default_value_t = 5.0)]
    ac_hours_per_day: f64,
    /// Household members (2-6)
    #[arg(long, default_value_t = 4)]
    family_size: i64,
    /// Billing month (Jan..Dec)
    #[arg(long, default_value = "Jan")]
    month: String,
    /// Tariff class (R1, R2, R3)
    #[arg(long, default_value = "R1")]
    tariff: String,
}

impl From<InputArgs> for RawInput {
    fn from(args: InputArgs) -> Self {
        RawInput {
            kwh: args.kwh,
            ac_units: args.ac_units,
            ac_hours_per_day: args.ac_hours_per_day,
            family_size: args.family_size,
            month_name: args.month,
            tariff_class: args.tariff,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let model_path = args.model.unwrap_or_else(ModelCache::default_model_path);
    // Lives for the whole process; every estimator below loads through it
    let cache = Arc::new(ModelCache::new());

    match args.command {
        Command::Schema => {
            print_schema(FeatureSchema::shared());
            Ok(ExitCode::SUCCESS)
        }
        Command::Predict(input) => {
            let raw = RawInput::from(input);
            print_input(&raw);
            if let Err(e) = raw.validate() {
                eprintln!("{}", e);
                return Ok(ExitCode::from(2));
            }

            let result = build_estimator(&cache, &model_path, args.sha256.as_deref())
                .and_then(|estimator| estimator.estimate(&raw));
            match result {
                Ok(bill) => {
                    println!("\nPredicted electricity bill:");
                    println!("  Tagihan Diprediksi: {}", format_rupiah(bill));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    report(&e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Batch { input } => run_batch(&cache, &model_path, args.sha256.as_deref(), &input),
    }
}

fn build_estimator(
    cache: &Arc<ModelCache>,
    model_path: &Path,
    sha256: Option<&str>,
) -> Result<BillEstimator, EstimatorError> {
    let mut builder = BillEstimator::builder()
        .with_cache(Arc::clone(cache))
        .with_model_path(model_path)?;
    if let Some(digest) = sha256 {
        builder = builder.with_expected_sha256(digest);
    }
    builder.build()
}

fn run_batch(
    cache: &Arc<ModelCache>,
    model_path: &Path,
    sha256: Option<&str>,
    input: &Path,
) -> anyhow::Result<ExitCode> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let estimator = match build_estimator(cache, model_path, sha256) {
        Ok(estimator) => estimator,
        Err(e) => {
            report(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut failures = 0usize;
    let mut total = 0usize;
    for record in estimator.estimate_lines(reader) {
        let record = record.with_context(|| format!("Failed to read {}", input.display()))?;
        total += 1;
        match record.result {
            Ok(bill) => println!("{}\t{}", record.line, format_rupiah(bill)),
            Err(e) => {
                failures += 1;
                eprintln!("{}\t{}", record.line, e);
            }
        }
    }

    info!("Batch finished: {} records, {} failed", total, failures);
    Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_input(raw: &RawInput) {
    println!("User input parameters:");
    println!("  kwh:              {:.2}", raw.kwh);
    println!("  ac_units:         {}", raw.ac_units);
    println!("  ac_hours_per_day: {:.2}", raw.ac_hours_per_day);
    println!("  family_size:      {}", raw.family_size);
    println!("  month_name:       {}", raw.month_name);
    println!("  tariff_class:     {}", raw.tariff_class);
}

fn print_schema(schema: &FeatureSchema) {
    println!("{} feature columns:", schema.len());
    for (i, column) in schema.columns().iter().enumerate() {
        println!("  {:>2}  {:<20} {}", i, column.name, column.scalar_type);
    }
    println!(
        "Baseline month: {}",
        schema.baseline_levels(MONTH_GROUP, &MONTH_CODES).join(", ")
    );
    println!(
        "Baseline tariff: {}",
        schema.baseline_levels(TARIFF_GROUP, &TARIFF_CLASSES).join(", ")
    );
}

fn report(err: &EstimatorError) {
    match err {
        EstimatorError::ModelError(ModelError::NotFound(_)) => eprintln!("{}", err),
        _ => {
            eprintln!("Prediction failed. Details below:");
            eprintln!("  {}", err);
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
        }
    }
}

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use grcnn_rs::dataset::{join_predictions, load_predictions, load_samples, write_bad_samples};
use grcnn_rs::pipeline::defaults::GreedyDecoder;
use grcnn_rs::{
    calibrate, CalibrationConfig, DatasetEvaluator, EditWeights, EvalConfig, EvaluationMode,
    Meta, Prediction, RecognizerModelConfig, Report, Sample, DEFAULT_ALPHABET,
    REPORT_SCHEMA_VERSION,
};
use indicatif::{ProgressBar, ProgressStyle};

#[path = "eval_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "eval_report/summary_formatter.rs"]
mod summary_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeChoice {
    /// Score a precomputed predictions file (text and/or probability matrices).
    Predictions,
    /// Score the dataset's own `baseline_text` column.
    Baseline,
}

impl ModeChoice {
    fn evaluation_mode(self) -> EvaluationMode {
        match self {
            Self::Predictions => EvaluationMode::Predictions,
            Self::Baseline => EvaluationMode::Baseline,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "eval_report")]
#[command(about = "Score product-code OCR predictions and calibrate confidence thresholds")]
struct Args {
    #[arg(long, env = "GRCNN_REPORT_DATASET")]
    dataset: PathBuf,
    #[arg(
        long,
        env = "GRCNN_REPORT_MODE",
        value_enum,
        default_value_t = ModeChoice::Predictions
    )]
    mode: ModeChoice,
    #[arg(long, env = "GRCNN_REPORT_PREDICTIONS")]
    predictions: Option<PathBuf>,
    #[arg(long, env = "GRCNN_REPORT_MODEL_CONFIG")]
    model_config: Option<PathBuf>,
    #[arg(long, env = "GRCNN_REPORT_OUT")]
    out: Option<PathBuf>,
    #[arg(long, env = "GRCNN_REPORT_BAD_SAMPLES_OUT")]
    bad_samples_out: Option<PathBuf>,
    /// Smallest distance written to the bad-samples file.
    #[arg(long, env = "GRCNN_REPORT_BAD_MIN_DISTANCE", default_value_t = 1)]
    bad_min_distance: u32,
    #[arg(long, env = "GRCNN_REPORT_ALPHABET", default_value = DEFAULT_ALPHABET)]
    alphabet: String,
    #[arg(
        long,
        env = "GRCNN_REPORT_ACCURACY_THRESHOLD",
        default_value_t = CalibrationConfig::DEFAULT_ACCURACY_THRESHOLD
    )]
    accuracy_threshold: f64,
    #[arg(
        long,
        env = "GRCNN_REPORT_COVERAGE_FLOOR",
        default_value_t = CalibrationConfig::DEFAULT_COVERAGE_FLOOR_PERCENT
    )]
    coverage_floor: f64,
    #[arg(
        long,
        env = "GRCNN_REPORT_THRESHOLD_COUNT",
        default_value_t = CalibrationConfig::DEFAULT_THRESHOLD_COUNT
    )]
    threshold_count: usize,
    #[arg(long, env = "GRCNN_REPORT_INSERTION_COST", default_value_t = EditWeights::PRODUCT_CODE.insertion)]
    insertion_cost: u32,
    #[arg(long, env = "GRCNN_REPORT_DELETION_COST", default_value_t = EditWeights::PRODUCT_CODE.deletion)]
    deletion_cost: u32,
    #[arg(long, env = "GRCNN_REPORT_SUBSTITUTION_COST", default_value_t = EditWeights::PRODUCT_CODE.substitution)]
    substitution_cost: u32,
    /// Keep every threshold of the calibration sweep in the JSON report.
    #[arg(long, env = "GRCNN_REPORT_INCLUDE_SWEEP", default_value_t = false)]
    include_sweep: bool,
    #[arg(long, env = "GRCNN_REPORT_LIMIT")]
    limit: Option<usize>,
    #[arg(long, env = "GRCNN_REPORT_OFFSET", default_value_t = 0)]
    offset: usize,
}

impl Args {
    fn eval_config(&self) -> EvalConfig {
        EvalConfig {
            alphabet: self.alphabet.clone(),
            edit_weights: EditWeights {
                insertion: self.insertion_cost,
                deletion: self.deletion_cost,
                substitution: self.substitution_cost,
            },
            calibration: CalibrationConfig {
                accuracy_threshold: self.accuracy_threshold,
                coverage_floor_percent: self.coverage_floor,
                threshold_count: self.threshold_count,
            },
            ..EvalConfig::default()
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let repo_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    let config = args.eval_config();
    config
        .validate()
        .map_err(|err| format!("Invalid configuration: {err}"))?;
    let alphabet = config
        .alphabet()
        .map_err(|err| format!("Invalid alphabet: {err}"))?;

    let model_config = args
        .model_config
        .as_ref()
        .map(|path| {
            let path = resolve_path(&repo_root, path);
            require_path_exists(&path, "Missing model config (config.json).")?;
            let model_config = RecognizerModelConfig::load(&path)
                .map_err(|err| format!("Failed to load '{}': {err}", path.display()))?;
            model_config
                .validate_alphabet(&alphabet)
                .map_err(|err| err.to_string())?;
            Ok::<_, String>(model_config)
        })
        .transpose()?;

    let dataset_path = resolve_path(&repo_root, &args.dataset);
    require_path_exists(&dataset_path, "Missing dataset file.")?;
    let mut samples =
        load_samples(&dataset_path).map_err(|err| format!("Failed to load dataset: {err}"))?;
    if args.offset > 0 {
        samples = samples.into_iter().skip(args.offset).collect();
    }
    if let Some(limit) = args.limit {
        samples.truncate(limit);
    }
    if samples.is_empty() {
        return Err("No samples selected after applying offset/limit.".to_string());
    }

    let predictions = match args.mode {
        ModeChoice::Predictions => {
            let path = args
                .predictions
                .as_ref()
                .ok_or_else(|| "--mode predictions requires --predictions.".to_string())?;
            let path = resolve_path(&repo_root, path);
            require_path_exists(&path, "Missing predictions file.")?;
            let records = load_predictions(&path)
                .map_err(|err| format!("Failed to load predictions: {err}"))?;
            join_predictions(&samples, records, &GreedyDecoder, &alphabet)
                .map_err(|err| format!("Failed to match predictions to samples: {err}"))?
        }
        ModeChoice::Baseline => samples.iter().map(Sample::baseline_prediction).collect(),
    };

    let out_path = resolve_out_path(&repo_root, args.out.as_ref());
    let report = build_report(&args, &config, &samples, &predictions, model_config)?;

    summary_formatter::print_summary(&report);
    json_report_formatter::write_report(&out_path, &report)?;
    println!("{}", out_path.display());

    if let Some(path) = args.bad_samples_out.as_ref() {
        let path = resolve_path(&repo_root, path);
        write_bad_samples(&path, &report.evaluation.bad_samples)
            .map_err(|err| format!("Failed to write bad samples '{}': {err}", path.display()))?;
        println!("{}", path.display());
    }
    Ok(())
}

fn build_report(
    args: &Args,
    config: &EvalConfig,
    samples: &[Sample],
    predictions: &[Prediction],
    model_config: Option<RecognizerModelConfig>,
) -> Result<Report, String> {
    let alphabet = config.alphabet().map_err(|err| err.to_string())?;
    let min_distance = args.bad_min_distance;
    let mut evaluator = DatasetEvaluator::new(&alphabet, config.edit_weights)
        .with_bad_sample_filter(move |dist| dist >= min_distance);
    if let Some(model_config) = model_config.as_ref() {
        evaluator = evaluator.with_ctc_input_length(model_config.max_text_len);
    }

    let progress = ProgressBar::new(samples.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("scoring...");

    for (sample, prediction) in samples.iter().zip(predictions) {
        evaluator
            .observe(sample, prediction)
            .map_err(|err| format!("{}: scoring failed: {err}", sample.id))?;
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let evaluation = evaluator.finish();
    let calibration = if evaluation.calibration_input.is_empty() {
        None
    } else {
        let mut calibration = calibrate(&evaluation.calibration_input, &config.calibration);
        if !args.include_sweep {
            calibration.drop_sweeps();
        }
        Some(calibration)
    };

    Ok(Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            dataset_path: args.dataset.to_string_lossy().into_owned(),
            mode: args.mode.evaluation_mode(),
            alphabet: alphabet.symbols(),
            device: None,
            edit_weights: config.edit_weights,
            accuracy_threshold: config.calibration.accuracy_threshold,
            sample_count: samples.len(),
            model: model_config,
        },
        evaluation,
        calibration,
    })
}

fn resolve_out_path(repo_root: &Path, out: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = out {
        return resolve_path(repo_root, path);
    }

    let run_id = Utc::now().format("%Y%m%dT%H%M%SZ");
    repo_root
        .join("target")
        .join("eval_reports")
        .join(format!("eval-report-{run_id}.json"))
}

fn resolve_path(repo_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

fn require_path_exists(path: &Path, message: &str) -> Result<(), String> {
    if path.exists() {
        Ok(())
    } else {
        Err(format!("{message} Path: '{}'", path.display()))
    }
}

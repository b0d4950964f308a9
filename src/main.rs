//! Riskscope: lifestyle-disease risk inference.
//!
//! Command-line entry point. Results go to stdout as JSON (or text for the
//! tree rendering); logs go to stderr or a log file.

use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroizing;

use riskscope::adapters::artifact::{sign_artifact, SigningSeed};
use riskscope::adapters::sanitize::SanitizingMakeWriter;
use riskscope::adapters::{ArtifactLoader, DecisionTree};
use riskscope::config::{LogTarget, Settings};
use riskscope::domain::{PatientForm, SweepPolicy, FEATURE_NAMES};
use riskscope::{InferenceService, ModelInsights, SensitivityAnalyzer, Session};

const SIGNING_KEY_FILE_ENV: &str = "RISKSCOPE_MODEL_SIGNING_KEY_B64_FILE";

fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    let _guard = init_logging(&settings.log_target)?;

    let matches = Command::new("riskscope")
        .version(clap::crate_version!())
        .about("Lifestyle-disease risk inference and what-if analysis over a fitted decision tree")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .global(true)
                .help("Path to the model artifact. Overrides RISKSCOPE_MODEL_PATH.")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict risk for one patient profile")
                .args(form_args()),
        )
        .subcommand(
            Command::new("sweep")
                .about("Show how predicted risk changes as one field varies")
                .arg(
                    Arg::new("field")
                        .short('f')
                        .long("field")
                        .required(true)
                        .help("Field to vary")
                        .value_parser(FEATURE_NAMES),
                )
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .help("Candidate range for continuous fields. Overrides RISKSCOPE_SWEEP_POLICY.")
                        .value_parser(["narrow", "wide"]),
                )
                .args(form_args()),
        )
        .subcommand(
            Command::new("insights")
                .about("Show feature importances and fitted hyperparameters")
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .help("Print the tree structure as text instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("max_depth")
                        .long("max-depth")
                        .help("Truncate the tree rendering below this depth")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate an Ed25519 model signing key")
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .required(true)
                        .help("File the base64 seed is written to (mode 0600)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing seed file")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sign")
                .about("Write manifest.json and model.sig next to a model artifact")
                .arg(
                    Arg::new("artifact")
                        .help("Model artifact to sign")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("key_file")
                        .short('k')
                        .long("key-file")
                        .help("File holding the base64 seed. Overrides RISKSCOPE_MODEL_SIGNING_KEY_B64_FILE.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .get_matches();

    let model_path = matches
        .get_one::<PathBuf>("model")
        .cloned()
        .unwrap_or_else(|| settings.model_path.clone());

    match matches.subcommand() {
        Some(("predict", sub_m)) => handle_predict(&settings, &model_path, sub_m),
        Some(("sweep", sub_m)) => handle_sweep(&settings, &model_path, sub_m),
        Some(("insights", sub_m)) => handle_insights(&settings, &model_path, sub_m),
        Some(("keygen", sub_m)) => handle_keygen(sub_m),
        Some(("sign", sub_m)) => handle_sign(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn init_logging(target: &LogTarget) -> Result<WorkerGuard> {
    let (writer, guard) = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: a missing directory surfaces on open below.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

/// Profile flags shared by `predict` and `sweep`.
fn form_args() -> Vec<Arg> {
    let number = |id: &'static str, long: &'static str, help: &'static str| {
        Arg::new(id)
            .long(long)
            .help(help)
            .value_parser(clap::value_parser!(f64))
    };
    let choice = |id: &'static str, long: &'static str, help: &'static str| {
        Arg::new(id)
            .long(long)
            .help(help)
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
    };

    vec![
        Arg::new("input")
            .short('i')
            .long("input")
            .help("JSON file with the profile. Flags override its fields.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        number("age", "age", "Age in years [default: 30]"),
        choice("gender", "gender", "Male or Female [default: Male]"),
        number("bmi", "bmi", "Body mass index [default: 25.0]"),
        number("daily_steps", "daily-steps", "Steps per day [default: 8000]"),
        number("sleep_hours", "sleep-hours", "Hours of sleep [default: 7.0]"),
        number("water_intake", "water-intake", "Water intake in litres [default: 2.0]"),
        number("calories", "calories", "Calories consumed per day [default: 2200]"),
        choice("smoker", "smoker", "Yes or No [default: No]"),
        choice("alcohol", "alcohol", "Yes or No [default: No]"),
        number("resting_hr", "resting-hr", "Resting heart rate [default: 75]"),
        number("systolic_bp", "systolic-bp", "Systolic blood pressure [default: 120]"),
        number("diastolic_bp", "diastolic-bp", "Diastolic blood pressure [default: 80]"),
        number("cholesterol", "cholesterol", "Cholesterol [default: 200]"),
        choice("family_history", "family-history", "Yes or No [default: No]"),
    ]
}

fn form_from_matches(matches: &ArgMatches) -> Result<PatientForm> {
    let mut form = match matches.get_one::<PathBuf>("input") {
        Some(path) => {
            let raw = std::fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
            serde_json::from_slice(&raw).with_context(|| format!("Invalid profile in {path:?}"))?
        }
        None => PatientForm::default(),
    };

    let numbers: [(&str, &mut f64); 10] = [
        ("age", &mut form.age),
        ("bmi", &mut form.bmi),
        ("daily_steps", &mut form.daily_steps),
        ("sleep_hours", &mut form.sleep_hours),
        ("water_intake", &mut form.water_intake),
        ("calories", &mut form.calories),
        ("resting_hr", &mut form.resting_hr),
        ("systolic_bp", &mut form.systolic_bp),
        ("diastolic_bp", &mut form.diastolic_bp),
        ("cholesterol", &mut form.cholesterol),
    ];
    for (id, slot) in numbers {
        if let Some(v) = matches.get_one::<f64>(id) {
            *slot = *v;
        }
    }

    let choices: [(&str, &mut String); 4] = [
        ("gender", &mut form.gender),
        ("smoker", &mut form.smoker),
        ("alcohol", &mut form.alcohol),
        ("family_history", &mut form.family_history),
    ];
    for (id, slot) in choices {
        if let Some(v) = matches.get_one::<String>(id) {
            slot.clone_from(v);
        }
    }

    Ok(form)
}

fn load_model(settings: &Settings, model_path: &Path) -> Result<Arc<DecisionTree>> {
    let tree = ArtifactLoader::new(settings.verification.clone())
        .load(model_path)
        .map_err(riskscope::RiskscopeError::from)
        .with_context(|| format!("Cannot start without a valid model at {model_path:?}"))?;
    Ok(Arc::new(tree))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_predict(settings: &Settings, model_path: &Path, matches: &ArgMatches) -> Result<()> {
    let vector = form_from_matches(matches)?.to_vector()?;
    let warnings = vector.validate_ranges().err().unwrap_or_default();
    for w in &warnings {
        tracing::warn!("Input outside the usual range: {w}");
    }

    let service = InferenceService::new(load_model(settings, model_path)?);
    let prediction = service.submit(&vector)?;

    print_json(&serde_json::json!({
        "predicted_label": prediction.predicted_label,
        "headline": prediction.headline(),
        "confidence": prediction.confidence(),
        "risk_probability": prediction.risk_probability(),
        "risk_level": prediction.risk_level(),
        "risk_description": prediction.risk_level().description(),
        "probabilities": prediction.probability_bars(),
        "profile": vector.radar_profile(),
        "warnings": warnings,
    }))
}

fn handle_sweep(settings: &Settings, model_path: &Path, matches: &ArgMatches) -> Result<()> {
    let field = matches
        .get_one::<String>("field")
        .context("--field is required")?;
    let policy = match matches.get_one::<String>("policy") {
        Some(name) => SweepPolicy::from_name(name).context("Unknown sweep policy")?,
        None => settings.sweep_policy,
    };

    let vector = form_from_matches(matches)?.to_vector()?;
    let service = Arc::new(InferenceService::new(load_model(settings, model_path)?));

    let mut session = Session::new();
    let prediction = service.submit(&vector)?;
    session.record(vector, prediction);

    let analyzer = SensitivityAnalyzer::new(Arc::clone(&service), policy);
    let result = analyzer.analyze(field, &session)?;

    let base_value = session
        .last_input
        .as_ref()
        .map(|v| v.get(result.field));
    let base_risk = session
        .last_prediction
        .as_ref()
        .map(|p| p.risk_probability());

    print_json(&serde_json::json!({
        "field": result.field,
        "label": result.field.label(),
        "base_value": base_value,
        "base_risk_probability": base_risk,
        "risk_span": result.risk_span(),
        "points": result.points,
    }))
}

fn handle_insights(settings: &Settings, model_path: &Path, matches: &ArgMatches) -> Result<()> {
    let insights = ModelInsights::new(load_model(settings, model_path)?);

    if matches.get_flag("tree") {
        let max_depth = matches.get_one::<usize>("max_depth").copied();
        let text = insights
            .render_tree(max_depth)
            .context("Model has no tree structure to render")?;
        print!("{text}");
        return Ok(());
    }

    print_json(&serde_json::json!({
        "feature_importances": insights.feature_importance_ranking(),
        "hyperparameters": insights.hyperparameters(),
    }))
}

fn handle_keygen(matches: &ArgMatches) -> Result<()> {
    let out = matches
        .get_one::<PathBuf>("out")
        .context("--out is required")?;
    if out.exists() && !matches.get_flag("force") {
        bail!("Refusing to overwrite existing file {out:?}. Use --force.");
    }
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let seed = SigningSeed::generate();
    let seed_b64 = seed.to_b64();

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(0o600);
    }
    let mut file = opts
        .open(out)
        .with_context(|| format!("Failed to open {out:?}"))?;
    file.write_all(seed_b64.as_bytes())?;
    file.write_all(b"\n")?;

    tracing::info!("Wrote signing seed to {:?}", out);
    // Only non-secret material goes to stdout.
    println!("{}", seed.public_key_b64());
    Ok(())
}

fn handle_sign(matches: &ArgMatches) -> Result<()> {
    let artifact = matches
        .get_one::<PathBuf>("artifact")
        .context("artifact path is required")?;
    let key_file = match matches.get_one::<PathBuf>("key_file") {
        Some(p) => p.clone(),
        None => std::env::var(SIGNING_KEY_FILE_ENV)
            .map(|p| PathBuf::from(p.trim()))
            .with_context(|| format!("Pass --key-file or set {SIGNING_KEY_FILE_ENV}"))?,
    };

    let seed_b64 = Zeroizing::new(
        std::fs::read_to_string(&key_file)
            .with_context(|| format!("Failed reading signing key file {key_file:?}"))?,
    );
    let seed = SigningSeed::from_b64(&seed_b64)?;

    let manifest = sign_artifact(artifact, &seed)?;
    print_json(&manifest)?;
    eprintln!("Public key: {}", seed.public_key_b64());
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facemood_core::artifact::default_fetchers;
use facemood_core::{ensure_artifact, profile, ClassifierSlot, InferencePipeline, ModelProfile, Outcome};
use facemood_store::{Submission, SubmissionStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facemood", version, about = "facemood emotion classifier CLI")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// SQLite database with recorded submissions
    #[arg(long, global = true, env = "FACEMOOD_DB_PATH", default_value = "database.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Local path of the ONNX classifier
    #[arg(long, global = true, env = "FACEMOOD_MODEL_PATH", default_value = "face_emotionModel.onnx")]
    model_path: PathBuf,

    /// Built-in profile name or path to a profile TOML
    #[arg(long, global = true, env = "FACEMOOD_MODEL_PROFILE", default_value = profile::DEFAULT_PROFILE)]
    profile: String,

    /// Override the profile's download URL
    #[arg(long, global = true, env = "FACEMOOD_MODEL_URL")]
    model_url: Option<String>,
}

impl ModelArgs {
    fn profile(&self) -> Result<ModelProfile> {
        let profile = ModelProfile::resolve(&self.profile)
            .with_context(|| format!("invalid model profile {:?}", self.profile))?;
        Ok(profile.with_model_url(self.model_url.clone()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the emotion in a photo
    Classify {
        image: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the model artifact if it is missing
    FetchModel,
    /// Create the submissions table
    InitDb,
    /// Show the most recent submissions
    Submissions {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// List built-in model profiles
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { image, json } => {
            let profile = cli.model.profile()?;
            let model_path = cli.model.model_path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let classifier = ClassifierSlot::load_onnx(&model_path);
                InferencePipeline::new(classifier, profile).classify_file(&image)
            })
            .await?;
            print_outcome(&outcome, json)?;
        }
        Commands::FetchModel => {
            let profile = cli.model.profile()?;
            let model_path = cli.model.model_path.clone();
            let status = tokio::task::spawn_blocking(move || {
                ensure_artifact(&model_path, &profile, &default_fetchers())
            })
            .await?;
            if !status.is_available() {
                bail!("could not obtain model at {}", cli.model.model_path.display());
            }
            tracing::info!(path = %cli.model.model_path.display(), status = ?status, "model artifact ready");
            println!("{}: {:?}", cli.model.model_path.display(), status);
        }
        Commands::InitDb => {
            let store = SubmissionStore::new(&cli.db_path);
            store.init_schema().await?;
            tracing::info!(path = %store.path().display(), "database initialized");
            println!("Initialized {}", store.path().display());
        }
        Commands::Submissions { limit, json } => {
            let store = SubmissionStore::new(&cli.db_path);
            let rows = store.recent(limit).await?;
            tracing::debug!(rows = rows.len(), limit, "loaded submissions");
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No submissions recorded");
            } else {
                for row in &rows {
                    println!("{}", submission_line(row));
                }
            }
        }
        Commands::Profiles => {
            for p in profile::list_builtin() {
                println!("{}", profile_line(p));
            }
        }
    }

    Ok(())
}

fn submission_line(row: &Submission) -> String {
    format!(
        "{:>5}  {}  {:<16} {:<14} {:<18} {}",
        row.id, row.created_at, row.emotion, row.matric, row.name, row.image_path
    )
}

fn profile_line(p: &ModelProfile) -> String {
    let shape = p.input_shape().map(|d| d.to_string()).join(",");
    format!(
        "{:<10} {:?} [{shape}] labels={}  {}",
        p.name,
        p.layout,
        p.labels.join(","),
        p.model_url
    )
}

fn outcome_json(outcome: &Outcome) -> serde_json::Value {
    serde_json::json!({
        "emotion": outcome.emotion(),
        "message": outcome.message(),
        "prediction": outcome.prediction(),
        "error": outcome.error(),
    })
}

/// Message line followed by an indented detail line.
fn outcome_text(outcome: &Outcome) -> String {
    let detail = match outcome {
        Outcome::Success(p) => format!("{} ({:.1}%)", p.emotion(), p.confidence * 100.0),
        Outcome::Unavailable => "model not available".to_string(),
        Outcome::DecodeError(e) | Outcome::InferenceError(e) => format!("error: {e}"),
    };
    format!("{}\n  {detail}", outcome.message())
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
    } else {
        println!("{}", outcome_text(outcome));
    }
    Ok(())
}

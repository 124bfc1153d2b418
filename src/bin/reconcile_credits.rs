//! One-shot credit repair.
//!
//! ```text
//! reconcile_credits --all
//! reconcile_credits --placement <officer-id>
//! reconcile_credits --file <uploaded-file-id>
//! ```

use clap::{ArgGroup, Parser};
use placement_roster::config::{Config, PipelineSettings};
use placement_roster::roster::{ReconcileScope, RosterPipeline};
use placement_roster::{db, utils::tracing::init_standard_tracing};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(about = "Bring placement candidates' credits back in line with their roster files")]
#[command(group(ArgGroup::new("scope").required(true).args(["all", "placement", "file"])))]
struct Args {
    /// Every placement candidate.
    #[arg(long)]
    all: bool,

    /// Candidates of one placement officer.
    #[arg(long, value_name = "OFFICER_ID")]
    placement: Option<Uuid>,

    /// Candidates whose credits come from one uploaded file.
    #[arg(long, value_name = "FILE_ID")]
    file: Option<Uuid>,

    #[command(flatten)]
    config: Config,
}

impl Args {
    fn scope(&self) -> ReconcileScope {
        match (self.placement, self.file) {
            (Some(id), _) => ReconcileScope::ByPlacement(id),
            (None, Some(id)) => ReconcileScope::ByFile(id),
            (None, None) => ReconcileScope::AllCandidates,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_standard_tracing(env!("CARGO_CRATE_NAME"), &args.config.log_level);

    let scope = args.scope();
    tracing::info!(%scope, "starting credit reconciliation");

    let db_connection = db::connect(&args.config).await?;
    let pipeline = RosterPipeline::new(db_connection, PipelineSettings::from(&args.config));

    let report = pipeline.reconcile_credits(scope).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.deferred_files.is_empty() {
        tracing::warn!(
            deferred = report.deferred_files.len(),
            "some files were busy; run again to repair their candidates"
        );
    }

    Ok(())
}

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod analytics;
mod audit;
mod config;
mod db;
mod error;
mod export;
mod filter;
mod models;
mod record;
mod registration;
mod report;
mod sections;
mod status;

use analytics::PatternRule;
use audit::Actor;
use config::Config;
use export::SectionSelection;
use filter::{AssessmentFilter, SortOrder};
use models::{Domain, Status};

#[derive(Parser)]
#[command(name = "assessment-tracker")]
#[command(about = "Multi-domain personnel assessment records and analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(long, value_enum)]
    status: Option<Status>,
    /// Only records where this domain has `--domain-status` (default: completed)
    #[arg(long, value_enum)]
    domain: Option<Domain>,
    #[arg(long, value_enum, requires = "domain")]
    domain_status: Option<Status>,
    /// Case-insensitive match on the derived full name
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    created_from: Option<NaiveDate>,
    #[arg(long)]
    created_to: Option<NaiveDate>,
    #[arg(long, value_enum, default_value_t = SortOrder::Newest)]
    sort: SortOrder,
}

impl FilterArgs {
    fn to_filter(&self) -> AssessmentFilter {
        AssessmentFilter {
            status: self.status,
            domain: self.domain,
            domain_status: self.domain_status,
            name_contains: self.name.clone(),
            created_from: self.created_from,
            created_to: self.created_to,
        }
    }
}

#[derive(clap::Args)]
struct SectionArgs {
    /// Sections to include, comma separated (default: all)
    #[arg(long, value_delimiter = ',', conflicts_with = "section_config")]
    sections: Vec<String>,
    /// JSON file of `{"sectionName": true|false}` switches
    #[arg(long)]
    section_config: Option<PathBuf>,
}

impl SectionArgs {
    fn selection(&self) -> anyhow::Result<SectionSelection> {
        if let Some(path) = &self.section_config {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let flags: BTreeMap<String, bool> =
                serde_json::from_str(&raw).context("section config must map names to booleans")?;
            return Ok(SectionSelection::from_flags(flags));
        }
        if self.sections.is_empty() {
            Ok(SectionSelection::all())
        } else {
            Ok(SectionSelection::only(self.sections.iter().cloned()))
        }
    }
}

#[derive(clap::Args)]
struct ActorArgs {
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    user_name: Option<String>,
}

impl ActorArgs {
    fn resolve(self, config: &Config) -> Actor {
        Actor::resolve(
            self.user_id.or_else(|| config.user_id.clone()),
            self.user_name.or_else(|| config.user_name.clone()),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample assessments
    Seed,
    /// Save one form section, creating the assessment if needed
    #[command(group(
        ArgGroup::new("payload")
            .args(["data", "data_file"])
            .required(true)
    ))]
    SaveSection {
        /// Existing assessment; a new one is created when omitted or unknown
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        section: String,
        /// Section fields as a JSON object
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
    /// Classify one domain of an assessment from its current section data
    DomainStatus {
        #[arg(long)]
        id: Uuid,
        /// Domain name, e.g. Physiotherapy
        #[arg(long)]
        domain: String,
    },
    /// Print one assessment as JSON
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// List assessments
    List {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Archive and delete an assessment
    Delete {
        #[arg(long)]
        id: Uuid,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Bring an archived assessment back
    Restore {
        #[arg(long)]
        id: Uuid,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Dashboard statistics over all assessments
    Analytics {
        #[arg(long, value_enum, default_value_t = PatternRule::Observed)]
        pattern_rule: PatternRule,
        /// Emit the raw statistics as JSON instead of markdown
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export assessments to CSV
    ExportCsv {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        sections: SectionArgs,
        #[arg(long, default_value = "assessments.csv")]
        out: PathBuf,
    },
    /// Write a markdown report for one assessment
    Report {
        #[arg(long)]
        id: Uuid,
        #[command(flatten)]
        sections: SectionArgs,
        #[arg(long, default_value = "assessment.md")]
        out: PathBuf,
    },
}

fn write_or_print(out: Option<&PathBuf>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Written to {}.", path.display());
        }
        None => print!("{contents}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assessment_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let today = Local::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::SaveSection {
            id,
            section,
            data,
            data_file,
        } => {
            let raw = match (data, data_file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("either --data or --data-file is required"),
            };
            let payload: serde_json::Value =
                serde_json::from_str(&raw).context("section data is not valid JSON")?;
            let saved = db::save_section(&pool, id, &section, payload).await?;

            println!("Saved {} on assessment {}.", section, saved.id);
            println!("Overall status: {}", saved.status);
            for domain in Domain::ALL {
                println!("- {}: {}", domain, saved.domain_status(domain));
            }
        }
        Commands::DomainStatus { id, domain } => {
            let found = db::fetch_assessment(&pool, id)
                .await?
                .ok_or(error::TrackerError::NotFound(id))?;
            let computed = status::calculate_domain_status(&domain, &found);
            println!("{}: {}", domain, computed);
            if Domain::parse(&domain).is_none() {
                warn!(%domain, "unknown domain, reported as pending");
            }
        }
        Commands::Show { id } => {
            let found = db::fetch_assessment(&pool, id)
                .await?
                .ok_or(error::TrackerError::NotFound(id))?;
            let mut view = serde_json::to_value(&found)?;
            if let Some(object) = view.as_object_mut() {
                object.insert(
                    "fullName".to_string(),
                    registration::full_name(&found).into(),
                );
                object.insert(
                    "age".to_string(),
                    serde_json::to_value(registration::age(&found, today))?,
                );
            }
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::List { filter, limit } => {
            let records = db::list_assessments(&pool).await?;
            let matched = filter.to_filter().apply(records, filter.sort);

            if matched.is_empty() {
                println!("No assessments match.");
                return Ok(());
            }

            println!("{} assessments:", matched.len());
            for found in matched.iter().take(limit) {
                let name = registration::full_name(found);
                println!(
                    "- {} {} [{}] created {}",
                    found.id,
                    if name.is_empty() { "(unnamed)" } else { name.as_str() },
                    found.status,
                    found.created_at.date_naive()
                );
            }
        }
        Commands::Delete { id, actor } => {
            let actor = actor.resolve(&config);
            let removed = db::delete_assessment(&pool, id, &actor).await?;
            println!("Archived and deleted assessment {}.", removed.id);
        }
        Commands::Restore { id, actor } => {
            let actor = actor.resolve(&config);
            let restored = db::restore_assessment(&pool, id, &actor).await?;
            println!("Restored assessment {}.", restored.id);
        }
        Commands::Analytics {
            pattern_rule,
            json,
            out,
        } => {
            let records = db::list_assessments(&pool).await?;
            let biomechanics = match db::fetch_biomechanics_records(&pool).await {
                Ok(sessions) => sessions,
                Err(err) => {
                    warn!(error = %err, "biomechanics collection unavailable, counting it as empty");
                    Vec::new()
                }
            };

            let stats =
                analytics::compute_analytics(&records, &biomechanics, &Local::now(), pattern_rule);
            let rendered = if json {
                serde_json::to_string_pretty(&stats)? + "\n"
            } else {
                report::build_analytics_report(&stats, today)
            };
            write_or_print(out.as_ref(), &rendered)?;
        }
        Commands::ExportCsv {
            filter,
            sections,
            out,
        } => {
            let selection = sections.selection()?;
            let records = db::list_assessments(&pool).await?;
            let matched = filter.to_filter().apply(records, filter.sort);

            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_csv(file, &matched, &selection, today)?;
            println!("Exported {} assessments to {}.", matched.len(), out.display());
        }
        Commands::Report { id, sections, out } => {
            let selection = sections.selection()?;
            let found = db::fetch_assessment(&pool, id)
                .await?
                .ok_or(error::TrackerError::NotFound(id))?;
            let rendered = report::build_assessment_report(&found, &selection, today);
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

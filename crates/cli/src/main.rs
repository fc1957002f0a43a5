//! Ledger CLI - customer progress across training, English and visa.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ledger_core::{
    check_score, CustomerId, Document, EnglishCourse, Exam, JobCategory, Stage, StageKey, TestScore,
    TestType, TrackKind, VisaCategory, VisaStep, VisaType,
};
use ledger_progress::{CustomerProgress, ProgressSnapshot};
use ledger_service::{BasicProgressLedger, ProgressLedger};
use ledger_storage::JsonStorage;
use tracing::info;

use crate::config::LedgerConfig;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Customer progress ledger", long_about = None)]
struct Cli {
    /// Data directory (overrides LEDGER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter (overrides LEDGER_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new customer
    Enroll {
        /// Job category code
        #[arg(long)]
        job: String,
        /// Job category name
        #[arg(long)]
        job_name: Option<String>,
        /// Visa type code
        #[arg(long)]
        visa: String,
        /// Visa type name
        #[arg(long)]
        visa_name: Option<String>,
        /// Visa category
        #[arg(long, default_value = "work")]
        visa_category: VisaCategory,
        /// Customer ID (generated if omitted)
        #[arg(long)]
        id: Option<CustomerId>,
    },
    /// Show a customer's progress
    Show {
        /// Customer ID
        id: CustomerId,
    },
    /// List customers
    List,
    /// Start a stage
    Start {
        id: CustomerId,
        /// Stage as <track>:<stage>, e.g. visa:lmia
        stage: StageKey,
    },
    /// Lodge a visa step
    Submit { id: CustomerId, stage: StageKey },
    /// Move a lodged visa step under review
    Review { id: CustomerId, stage: StageKey },
    /// Approve a visa step
    Approve { id: CustomerId, stage: StageKey },
    /// Reject a visa step
    Reject { id: CustomerId, stage: StageKey },
    /// Complete a stage
    Complete {
        id: CustomerId,
        stage: StageKey,
        /// Assessment score
        #[arg(long, value_parser = parse_score)]
        score: Option<f64>,
    },
    /// Record an externally verified training outcome
    Endorse { id: CustomerId, stage: StageKey },
    /// Reset a stage to not started
    Reset { id: CustomerId, stage: StageKey },
    /// Record an English test score
    Score {
        id: CustomerId,
        /// pte or ielts
        test: TestType,
        /// Overall score
        #[arg(value_parser = parse_score)]
        overall: f64,
        /// Target overall score
        #[arg(long, value_parser = parse_score)]
        target: Option<f64>,
        /// Last day the result is accepted (YYYY-MM-DD)
        #[arg(long)]
        valid_until: Option<NaiveDate>,
    },
    /// Record one attended session of an English course
    Attend {
        id: CustomerId,
        /// Course, e.g. beginner
        #[arg(value_parser = parse_course)]
        course: EnglishCourse,
    },
    /// Record a midterm or final mark of an English course
    Exam {
        id: CustomerId,
        #[arg(value_parser = parse_course)]
        course: EnglishCourse,
        /// midterm or final
        exam: Exam,
        #[arg(value_parser = parse_score)]
        score: f64,
    },
    /// Mark a visa document as submitted, or add it to the checklist
    Doc {
        id: CustomerId,
        /// Visa step, e.g. checklist
        #[arg(value_parser = parse_step)]
        step: VisaStep,
        /// Document name
        name: String,
        /// Add the document to the checklist instead
        #[arg(long)]
        require: bool,
        /// With --require: the document is optional
        #[arg(long, requires = "require")]
        optional: bool,
    },
}

fn parse_score(s: &str) -> std::result::Result<f64, String> {
    let score: f64 = s.parse().map_err(|e| format!("{e}"))?;
    check_score(score).map_err(|e| e.to_string())
}

fn parse_course(s: &str) -> std::result::Result<EnglishCourse, String> {
    let name = s.trim().to_ascii_lowercase();
    EnglishCourse::ALL
        .into_iter()
        .find(|c| c.as_str() == name)
        .ok_or_else(|| format!("unknown course '{s}'"))
}

fn parse_step(s: &str) -> std::result::Result<VisaStep, String> {
    let name = s.trim().to_ascii_lowercase();
    VisaStep::ALL
        .into_iter()
        .find(|step| step.as_str() == name)
        .ok_or_else(|| format!("unknown visa step '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LedgerConfig::load()?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir)?;
    }
    if let Some(filter) = cli.log {
        config = config.with_log_filter(filter)?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .init();

    let storage = JsonStorage::new(&config.data_dir)
        .await
        .with_context(|| format!("opening data directory {}", config.data_dir.display()))?;
    let ledger = BasicProgressLedger::new(storage);
    let json = cli.json;

    match cli.command {
        Commands::Enroll { job, job_name, visa, visa_name, visa_category, id } => {
            let job_category = JobCategory::new(job.clone(), job_name.unwrap_or(job));
            let visa_type = VisaType::new(visa.clone(), visa_name.unwrap_or(visa), visa_category);
            let customer_id = id.unwrap_or_default();

            let progress = ledger.enroll_customer(customer_id, job_category, visa_type).await?;
            info!("Enrolled {}", progress.customer_id);
            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                println!("Enrolled customer: {}", progress.customer_id);
            }
        }
        Commands::Show { id } => {
            let snapshot = ledger.snapshot(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        Commands::List => {
            let customers = ledger.list_customers().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&customers)?);
            } else {
                print_customers(&customers);
            }
        }
        Commands::Start { id, stage } => print_stage(&ledger.start(id, stage).await?, json)?,
        Commands::Submit { id, stage } => print_stage(&ledger.submit(id, stage).await?, json)?,
        Commands::Review { id, stage } => print_stage(&ledger.begin_review(id, stage).await?, json)?,
        Commands::Approve { id, stage } => print_stage(&ledger.approve(id, stage).await?, json)?,
        Commands::Reject { id, stage } => print_stage(&ledger.reject(id, stage).await?, json)?,
        Commands::Complete { id, stage, score } => {
            print_stage(&ledger.complete(id, stage, score).await?, json)?
        }
        Commands::Endorse { id, stage } => print_stage(&ledger.endorse(id, stage).await?, json)?,
        Commands::Reset { id, stage } => print_stage(&ledger.reset(id, stage).await?, json)?,
        Commands::Score { id, test, overall, target, valid_until } => {
            let mut score = TestScore::new(test, overall);
            score.target = target;
            score.valid_until = valid_until;
            let achieved = score.is_target_achieved();

            let latest = ledger.record_test_score(id, score).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "test": test.as_str(), "latest": latest, "target_achieved": achieved })
                );
            } else {
                println!("Recorded {} {:.1} (latest counted: {:.1})", test.as_str(), overall, latest);
                if !achieved {
                    println!("  Below target");
                }
            }
        }
        Commands::Attend { id, course } => {
            let stage = ledger.record_attendance(id, course).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stage)?);
            } else if let Some(work) = &stage.coursework {
                println!(
                    "{}: {}/{} sessions ({:.0}%)",
                    stage.key,
                    work.attended_sessions,
                    work.total_sessions,
                    work.attendance_rate()
                );
            }
        }
        Commands::Exam { id, course, exam, score } => {
            print_stage(&ledger.record_exam(id, course, exam, score).await?, json)?
        }
        Commands::Doc { id, step, name, require, optional } => {
            let stage = if require {
                let document = if optional { Document::optional(name) } else { Document::required(name) };
                ledger.require_document(id, step, document).await?
            } else {
                ledger.submit_document(id, step, name).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&stage)?);
            } else {
                let missing = stage.missing_documents();
                if missing.is_empty() {
                    println!("{}: all required documents submitted", stage.key);
                } else {
                    println!("{}: missing {}", stage.key, missing.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn print_stage(stage: &Stage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stage)?);
        return Ok(());
    }

    print!("{} -> {}", stage.key, stage.status);
    if let Some(score) = stage.score {
        print!(" (score {:.1})", score);
    }
    println!();
    Ok(())
}

fn print_customers(customers: &[CustomerProgress]) {
    println!("Customers ({})", customers.len());
    for customer in customers {
        println!(
            "  {} | {} | {} | {:5.1}%",
            customer.customer_id,
            customer.job_category.code,
            customer.visa_type.code,
            customer.overall_percentage(),
        );
    }
}

fn print_snapshot(snapshot: &ProgressSnapshot) {
    println!("Customer: {}", snapshot.customer_id);
    println!("  Overall: {:.1}%", snapshot.overall_percentage);
    for track in &snapshot.tracks {
        println!(
            "  {:<8} {:5.1}%  ({}/{} stages)",
            track.kind.as_str(),
            track.percentage,
            track.completed_stages,
            track.total_stages,
        );
    }
    println!("  English: {}", snapshot.english_status.as_str());
    println!(
        "  Latest scores: PTE {:.1} (pass {}), IELTS {:.1} (pass {})",
        snapshot.latest_pte,
        TestType::Pte.passing_score(),
        snapshot.latest_ielts,
        TestType::Ielts.passing_score(),
    );
    for (stage, grade) in &snapshot.training_grades {
        println!("  Grade {}: {:?}", stage, grade);
    }
    for (course, rate) in &snapshot.attendance {
        println!("  Attendance {}: {:.0}%", course, rate);
    }
    for (step, missing) in &snapshot.missing_documents {
        println!("  Documents {}: missing {}", step, missing.join(", "));
    }

    if !snapshot.blockers.ready.is_empty() {
        let ready: Vec<String> = snapshot.blockers.ready.iter().map(ToString::to_string).collect();
        println!("  Ready: {}", ready.join(", "));
    }
    for blocker in &snapshot.blockers.blocked {
        let missing: Vec<String> = blocker.missing.iter().map(ToString::to_string).collect();
        println!("  Blocked: {} (waiting on {})", blocker.stage, missing.join(", "));
    }

    let estimate = &snapshot.estimate;
    println!(
        "  Remaining: {:.0}h training, {:.0}h English, {} visa days",
        estimate.remaining_training_hours,
        estimate.remaining_english_hours,
        estimate.remaining_visa_days,
    );
    println!("  Estimated completion: {}", estimate.estimated_completion.date_naive());

    let visa = snapshot.track(TrackKind::Visa).map_or(0.0, |t| t.percentage);
    if visa >= 100.0 {
        println!("  Visa pipeline complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_complete_with_score() {
        let id = CustomerId::new();
        let cli = Cli::try_parse_from([
            "ledger",
            "complete",
            &id.to_string(),
            "visa:lmia",
            "--score",
            "7.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Complete { id: parsed, stage, score } => {
                assert_eq!(parsed, id);
                assert_eq!(stage, StageKey::Visa(VisaStep::Lmia));
                assert_eq!(score, Some(7.5));
            }
            _ => panic!("expected complete"),
        }
    }

    #[test]
    fn test_parse_rejects_non_finite_scores() {
        let id = CustomerId::new();
        for bad in ["NaN", "inf", "-2"] {
            assert!(Cli::try_parse_from(["ledger", "score", &id.to_string(), "pte", bad]).is_err());
            assert!(Cli::try_parse_from([
                "ledger",
                "complete",
                &id.to_string(),
                "training:theory",
                "--score",
                bad,
            ])
            .is_err());
        }
    }

    #[test]
    fn test_parse_coursework_and_document_commands() {
        let id = CustomerId::new();
        let cli = Cli::try_parse_from(["ledger", "exam", &id.to_string(), "Foundation", "final", "6.5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Exam { course: EnglishCourse::Foundation, exam: Exam::Final, score, .. } if score == 6.5
        ));

        let cli = Cli::try_parse_from([
            "ledger",
            "doc",
            &id.to_string(),
            "job_offer",
            "Reference Letter",
            "--require",
            "--optional",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Doc { step: VisaStep::JobOffer, require: true, optional: true, ref name, .. }
                if name == "Reference Letter"
        ));

        assert!(Cli::try_parse_from(["ledger", "attend", &id.to_string(), "advanced"]).is_err());
        assert!(Cli::try_parse_from(["ledger", "doc", &id.to_string(), "lmia", "Ad", "--optional"]).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_stage() {
        let id = CustomerId::new();
        assert!(Cli::try_parse_from(["ledger", "start", &id.to_string(), "visa:passport"]).is_err());
    }

    #[test]
    fn test_parse_score_and_global_flags() {
        let id = CustomerId::new();
        let cli = Cli::try_parse_from([
            "ledger",
            "score",
            &id.to_string(),
            "IELTS",
            "6.5",
            "--json",
            "--data-dir",
            "/tmp/ledger",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ledger")));
        assert!(matches!(
            cli.command,
            Commands::Score { test: TestType::Ielts, overall, .. } if overall == 6.5
        ));
    }
}

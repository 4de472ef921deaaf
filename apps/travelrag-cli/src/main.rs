use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travelrag_cli::cli::{Cli, Command};
use travelrag_cli::{JsonRecordStore, NewReview};
use travelrag_core::config::Config;
use travelrag_engine::{ClassOutcome, RagEngine, SyncReport};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,travelrag=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn spinner(msg: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn print_report(report: &SyncReport) {
    for (name, outcome) in [("faqs", &report.faqs), ("reviews", &report.reviews)] {
        match outcome {
            ClassOutcome::Indexed(n) => println!("📊 {name}: indexed {n}"),
            ClassOutcome::Failed(reason) => println!("⚠️  {name}: failed ({reason})"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let records = Arc::new(JsonRecordStore::open(&settings.data.records_path()).await?);
    let engine = RagEngine::open(&settings, records.clone()).await?;

    match cli.command {
        Command::Init => {
            let pb = spinner("loading records")?;
            let outcome = engine.initialize().await;
            pb.finish_and_clear();
            match outcome? {
                Some(report) => print_report(&report),
                None => println!("✅ Index already populated, nothing to load"),
            }
        }
        Command::Query { role, json, question } => {
            let result = engine.query(&question.join(" "), role.into()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
                if !result.sources.is_empty() {
                    println!("\nSources:");
                    for s in &result.sources {
                        println!("  - {} #{}", s.source, s.db_id);
                    }
                }
            }
        }
        Command::AddFaq { hotel_id, question, answer } => {
            let faq = records.insert_faq(hotel_id, question, answer).await?;
            engine.add_faq(&faq).await;
            println!("✅ Added faq #{}", faq.id);
        }
        Command::AddReview { user_id, hotel_id, rating, content } => {
            let enrichment = engine.enrich_review(&content).await;
            let review = records.insert_review(NewReview { user_id, hotel_id, content, rating }, enrichment).await?;
            engine.add_review(&review).await;
            println!("✅ Added review #{} ({}, {})", review.id, review.sentiment, review.emotion);
        }
        Command::Reindex => {
            let pb = spinner("re-embedding records")?;
            let report = engine.reload_all().await;
            pb.finish_and_clear();
            print_report(&report);
            report.into_result()?;
        }
        Command::Status { json } => {
            let status = engine.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("state: {:?}", status.state);
                println!("documents: {}", status.documents);
                match status.last_persisted {
                    Some(cp) => println!("last persisted: version {} at {}", cp.version, cp.at_millis),
                    None => println!("last persisted: never"),
                }
            }
        }
    }
    Ok(())
}

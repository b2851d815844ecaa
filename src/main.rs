use std::sync::Arc;

use apply_pilot::batch::BatchManager;
use apply_pilot::boards::BoardRegistry;
use apply_pilot::browser::cdp::CdpDriver;
use apply_pilot::core::config;
use apply_pilot::core::AutomationEngine;
use apply_pilot::storage::MemoryJobStore;
use apply_pilot::{BatchEvent, BatchSettings, JobRecord, UserProfile};
use tracing::info;

const USAGE: &str = "\
apply-pilot: job-application automation engine

USAGE:
    apply-pilot detect <url>          Detect the application form on a job page
    apply-pilot captcha <url>         Scan a page for anti-bot challenges
    apply-pilot board <url>           Show the resolved job-board profile
    apply-pilot batch <url> [url...]  Dry-run a batch session over job URLs
";

fn profile_from_env() -> UserProfile {
    let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
    UserProfile {
        first_name: var("APPLY_PILOT_FIRST_NAME"),
        last_name: var("APPLY_PILOT_LAST_NAME"),
        email: var("APPLY_PILOT_EMAIL"),
        phone: var("APPLY_PILOT_PHONE"),
        location: var("APPLY_PILOT_LOCATION"),
        linkedin: var("APPLY_PILOT_LINKEDIN"),
        portfolio: var("APPLY_PILOT_PORTFOLIO"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((c, rest)) => (c.as_str(), rest),
        None => {
            eprint!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let pilot_config = config::load_pilot_config();
    let boards = Arc::new(BoardRegistry::with_builtins());

    match command {
        "board" => {
            let url = rest.first().ok_or_else(|| anyhow::anyhow!("board: missing <url>"))?;
            match boards.resolve(url) {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("null"),
            }
            return Ok(());
        }
        "detect" | "captcha" | "batch" => {}
        _ => {
            eprint!("{}", USAGE);
            std::process::exit(2);
        }
    }

    let driver = Arc::new(CdpDriver::launch(&pilot_config).await?);
    let engine = Arc::new(AutomationEngine::new(
        driver.clone(),
        boards,
        &pilot_config,
    ));

    match command {
        "detect" => {
            let url = rest.first().ok_or_else(|| anyhow::anyhow!("detect: missing <url>"))?;
            let result = engine.detect_job_page(url).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "captcha" => {
            let url = rest.first().ok_or_else(|| anyhow::anyhow!("captcha: missing <url>"))?;
            let result = engine.detect_captcha(url).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "batch" => {
            if rest.is_empty() {
                anyhow::bail!("batch: at least one <url> required");
            }
            let store = Arc::new(MemoryJobStore::new());
            let mut job_ids = Vec::new();
            for (i, url) in rest.iter().enumerate() {
                let id = format!("job-{}", i + 1);
                store
                    .insert_job(JobRecord {
                        id: id.clone(),
                        url: url.clone(),
                        title: String::new(),
                        board_hint: None,
                    })
                    .await;
                job_ids.push(id);
            }

            let manager = BatchManager::new(engine, store);
            let mut events = manager.subscribe();
            let settings = BatchSettings {
                dry_run: true,
                delay_min_seconds: pilot_config.resolve_delay_min_seconds(),
                delay_max_seconds: pilot_config.resolve_delay_max_seconds(),
                ..Default::default()
            };
            let session_id =
                manager.start_session(job_ids, settings, profile_from_env(), None);
            info!("session {} started", session_id);

            while let Ok(event) = events.recv().await {
                match event {
                    BatchEvent::Log { log, .. } => {
                        println!("[{:?}] {}", log.level, log.message);
                    }
                    BatchEvent::SessionUpdated { session } => {
                        if session.status.is_terminal() {
                            println!("{}", serde_json::to_string_pretty(&session)?);
                            break;
                        }
                    }
                }
            }
        }
        _ => unreachable!(),
    }

    driver.shutdown().await;
    Ok(())
}

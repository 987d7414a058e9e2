use chrono::{Duration, Utc};
use deployflow::config::Config;
use deployflow::db;
use deployflow::schedules::notify::build_mailer;
use deployflow::schedules::{
    NewSchedule, Notifier, NotifyPolicy, ScheduleManager, ScheduleStore, SchedulesRepo,
};
use std::env;
use std::sync::Arc;
use uuid::Uuid;

const DEMO_APPS: [&str; 4] = ["Billing", "Checkout", "Search", "Reporting"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "deployctl <command>\n\
             Commands:\n\
             - migrate\n\
             - reset\n\
             - seed <n>\n\
             - list\n\
             - notify <schedule_id>\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let cfg = Config::from_env()?;
    let url = cfg
        .database_url
        .clone()
        .or_else(|| env::var("TEST_DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = db::make_pool(&url).await?;
    let repo = SchedulesRepo::new(pool.clone());

    match args[1].as_str() {
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrations OK");
        }
        "reset" => {
            repo.truncate().await?;
            println!("reset OK");
        }
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&repo, n).await?;
            println!("schedules: {}", repo.count().await?);
        }
        "list" => list(&repo).await?,
        "notify" => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: deployctl notify <schedule_id>"))?;
            let id: Uuid = id.parse()?;

            let notifier = Notifier::from_config(build_mailer(&cfg.mail)?, &cfg.mail);
            let manager = ScheduleManager::new(Arc::new(repo), notifier).with_policy(NotifyPolicy {
                notify_on_developers_change: cfg.notify_on_developers_change,
            });

            let schedule = manager.notify(id).await?;
            println!(
                "notified {} developer(s) for {} ({})",
                schedule.developers.len(),
                schedule.app_name,
                schedule.status
            );
        }
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

// Seeded rows skip notification on purpose: they go straight through the store.
async fn seed(repo: &SchedulesRepo, n: usize) -> anyhow::Result<()> {
    for i in 0..n {
        let app = DEMO_APPS[i % DEMO_APPS.len()];
        let schedule = repo
            .create(NewSchedule {
                app_name: app.to_string(),
                deployment_date: Utc::now() + Duration::days(i as i64 + 1),
                time_slot: "10:00-11:00".to_string(),
                developers: vec!["alice@example.com".to_string(), "bob@example.com".to_string()],
                notes: None,
            })
            .await?;

        println!("+ inserted schedule {app} id={}", schedule.id);
    }
    Ok(())
}

async fn list(repo: &SchedulesRepo) -> anyhow::Result<()> {
    for s in repo.list().await? {
        let notified = s
            .notification_details
            .as_ref()
            .map(|d| format!("{} at {}", d.status, d.sent_at.to_rfc3339()))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{} | {} | {} | {} | {} | devs={} | last_notified={}",
            s.id,
            s.app_name,
            s.deployment_date.to_rfc3339(),
            s.time_slot,
            s.status,
            s.developers.join(","),
            notified
        );
    }
    Ok(())
}

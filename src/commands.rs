//! Operator command handlers.

use chrono::Utc;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::config::HeraldConfig;
use crate::error::HeraldError;
use crate::publisher::{PublishOutcome, Publisher};
use crate::record::{JsonStore, NewPost, PostStore, RecordPolicy, RecordService};
use crate::schedule;
use crate::session::{Launcher, SessionManager, SessionTiming};
use crate::ui::{self, PublishProgress};

pub async fn dispatch(cli: Cli) -> Result<(), HeraldError> {
    let mut config = HeraldConfig::load(cli.config.as_deref())?;
    let mut store = JsonStore::open(config.store_path(), config.activity_capacity)?;
    debug!(store = %store.path().display(), "store opened");
    let policy = RecordPolicy::from(&config);

    match cli.command {
        Command::Create { post, at } => create(&mut store, policy, post.into_post(at)),
        Command::Schedule { post } => {
            let at = schedule::smart_time_utc(Utc::now());
            create(&mut store, policy, post.into_post(Some(at)))
        }
        Command::List { status } => {
            let records = RecordService::new(&mut store, policy).list(status.status())?;
            ui::print_records(&records);
            Ok(())
        }
        Command::Approve { id } => {
            let record = RecordService::new(&mut store, policy).approve(&id, Utc::now())?;
            println!("Approved {}", record.short_id());
            Ok(())
        }
        Command::Reject { id, reason } => {
            let record = RecordService::new(&mut store, policy).reject(&id, &reason, Utc::now())?;
            println!("Rejected {}: {reason}", record.short_id());
            Ok(())
        }
        Command::Status { id } => {
            let service = RecordService::new(&mut store, policy);
            let record = service.get(&id)?;
            let approval = service.approval_for(&record)?;
            ui::print_record(&record, approval.as_ref());
            Ok(())
        }
        Command::Retry { id } => {
            let record = RecordService::new(&mut store, policy).retry(&id, Utc::now())?;
            println!(
                "Re-queued {} (attempt {}/{})",
                record.short_id(),
                record.retry_count,
                record.max_retries
            );
            Ok(())
        }
        Command::PostNow { id, headless } => {
            config.headless |= headless;
            post_now(&config, &mut store, &id, cli.verbose).await
        }
        Command::Run { limit, headless } => {
            config.headless |= headless;
            run(&config, &mut store, limit, cli.verbose).await
        }
        Command::Sweep => {
            let report = RecordService::new(&mut store, policy).sweep(Utc::now())?;
            ui::print_sweep(&report);
            Ok(())
        }
        Command::Activity { limit } => {
            ui::print_activity(&store.recent_activity(limit)?);
            Ok(())
        }
    }
}

fn create(store: &mut dyn PostStore, policy: RecordPolicy, post: NewPost) -> Result<(), HeraldError> {
    let record = RecordService::new(store, policy).create(post, Utc::now())?;
    println!(
        "Created {} ({}, scheduled {})",
        record.short_id(),
        record.status,
        record.scheduled_at.to_rfc3339()
    );
    Ok(())
}

async fn post_now(
    config: &HeraldConfig,
    store: &mut dyn PostStore,
    id: &str,
    verbose: bool,
) -> Result<(), HeraldError> {
    let description = store.resolve(id)?.preview(50);
    let mut publisher = publisher(config)?;
    let progress = PublishProgress::start(&description);
    publisher.set_observer(progress.observer());

    let result = publisher.publish_now(store, id, Utc::now()).await;
    publisher.release();
    match result {
        Ok(outcome) => {
            progress.complete(&outcome);
            match outcome {
                PublishOutcome::Published { report, .. } if verbose => ui::print_report(&report),
                PublishOutcome::Failed { error, .. } => return Err(error.into()),
                _ => {}
            }
            Ok(())
        }
        Err(err) => {
            progress.abort(&err.to_string());
            Err(err)
        }
    }
}

/// Publishes due records one at a time. Content failures move on to the
/// next record; a session failure stops the run.
async fn run(
    config: &HeraldConfig,
    store: &mut dyn PostStore,
    limit: Option<usize>,
    verbose: bool,
) -> Result<(), HeraldError> {
    let mut publisher = publisher(config)?;
    let mut attempts = 0usize;
    let mut failures = 0usize;

    while limit.is_none_or(|max| attempts < max) {
        let progress = PublishProgress::start("next due post");
        publisher.set_observer(progress.observer());
        let outcome = match publisher.publish_next(store, Utc::now()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                progress.abort(&err.to_string());
                publisher.release();
                return Err(err);
            }
        };
        progress.complete(&outcome);
        match &outcome {
            PublishOutcome::Published { report, .. } if verbose => ui::print_report(report),
            PublishOutcome::Failed { .. } => failures += 1,
            _ => {}
        }
        if outcome.is_skip() {
            break;
        }
        attempts += 1;
    }

    publisher.release();
    println!("{attempts} attempted, {failures} failed");
    Ok(())
}

fn publisher(config: &HeraldConfig) -> Result<Publisher, HeraldError> {
    let session = SessionManager::new(
        launcher(config)?,
        config.surface.clone(),
        config.credentials(),
        SessionTiming::from(&config.timing),
    );
    Ok(Publisher::new(session, config))
}

#[cfg(feature = "browser")]
fn launcher(config: &HeraldConfig) -> Result<Box<dyn Launcher>, HeraldError> {
    Ok(Box::new(crate::surface::chrome::ChromeLauncher::new(config)))
}

#[cfg(not(feature = "browser"))]
fn launcher(_config: &HeraldConfig) -> Result<Box<dyn Launcher>, HeraldError> {
    Err(HeraldError::Config(
        "herald was built without the `browser` feature".into(),
    ))
}

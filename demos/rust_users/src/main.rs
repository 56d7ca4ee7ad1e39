//! EntiTrack users demo
//!
//! Drives one unit of work over a users repository backed by a fake
//! Postgres connection and a read-only groups repository backed by a fixed
//! list. Every statement the connection receives is logged, so the output
//! shows which calls a commit issues and in what order.

mod model;
mod postgres;
mod uow;

use clap::Parser;
use entitrack_core::{
    DeletePolicy, Entity, EntityKey, ReadOnlyRepository, Repository, TrackerConfig, UnitOfWork,
    UnsupportedPolicy,
};
use model::{Group, User, UserChange};
use postgres::FakePostgresConnection;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uow::PostgresUnitOfWork;

/// Runs a sample unit of work against a fake Postgres connection.
#[derive(Parser)]
#[command(name = "rust_users")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (entity state transitions)
    #[arg(short, long)]
    verbose: bool,

    /// Group whose students are loaded first
    #[arg(short, long, default_value = "kp71")]
    group: String,

    /// Roll back instead of committing
    #[arg(long)]
    rollback: bool,

    /// Fail the commit if a pending change cannot be persisted, and reject
    /// repeated deletes
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = if cli.strict {
        TrackerConfig::new()
            .unsupported(UnsupportedPolicy::FailFast)
            .delete(DeletePolicy::Strict)
    } else {
        TrackerConfig::default()
    };

    info!("start unit of work");
    let uow = PostgresUnitOfWork::new(
        Arc::new(FakePostgresConnection),
        vec![
            Group::new("kp71", "KP-71", 2017, "#3366cc"),
            Group::new("kp72", "KP-72", 2017, "#cc6633"),
        ],
        config,
    );

    let students = uow
        .users()
        .apply_many(uow.users_dao().students_of(&cli.group))
        .await?;
    info!(group = %cli.group, count = students.len(), "students loaded");

    if let Some(admin) = uow
        .users()
        .apply_single(uow.users_dao().by_username("admin"))
        .await?
    {
        info!(user = %admin.key(), state = %admin.state(), "looked up by username");
    }

    let groups = uow.groups().get_all().await?;
    info!(count = groups.len(), "groups loaded");

    let u1 = uow.users().get(&EntityKey::from("0")).await?;
    uow.users().get(&EntityKey::from("0")).await?;
    let u2 = uow.users().get(&EntityKey::from("1")).await?;
    let u3 = uow.users().get(&EntityKey::from("2")).await?;

    if let Some(u1) = &u1 {
        u1.set(UserChange::Fullname("Hello".into()));
    }
    if let Some(u2) = &u2 {
        uow.users().remove(u2)?;
    }
    if let Some(u1) = &u1 {
        u1.set(UserChange::Fullname(String::new()));
    }
    if let Some(u3) = &u3 {
        u3.set(UserChange::Fullname("A Three 000".into()));
    }

    let new_user = Entity::new(User::new(3, "333"));
    uow.users().add(&new_user)?;
    new_user.set(UserChange::Fullname("Changed!".into()));

    if cli.rollback {
        uow.rollback();
        info!(state = %new_user.state(), "unit of work rolled back");
        return Ok(());
    }

    let report = uow.commit().await?;
    info!(
        deleted = report.deleted,
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped.len(),
        "done"
    );
    Ok(())
}

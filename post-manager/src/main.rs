/*!
Post manager: browse posts from a REST service and keep a durable queue of
deletions that is reconciled against it
*/

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::manager::{
    config::ManagerConfig,
    event_system::ReconcileScheduler,
    session::{create_session, PostSession},
};

mod manager;

fn cli() -> Command {
    Command::new("post-manager")
        .version(clap::crate_version!())
        .about("Lists posts, queues deletions and reconciles them against the posts service")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("TOML configuration file")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("state")
                .short('s')
                .long("state")
                .help("SQLite file holding the delete queue")
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .help("Base URL of the posts service")
                .value_name("URL")
                .global(true),
        )
        .subcommand(Command::new("list").about("Fetch and print the posts not queued for deletion"))
        .subcommand(
            Command::new("comments")
                .about("Print the comments of a post")
                .arg(post_id_arg().required(true)),
        )
        .subcommand(
            Command::new("delete")
                .about("Queue posts for deletion")
                .arg(post_id_arg().required(true).num_args(1..)),
        )
        .subcommand(Command::new("reconcile").about("Replay the delete queue against the service"))
        .subcommand(
            Command::new("refresh").about("Reconcile, then re-fetch every post and reset the queue"),
        )
        .subcommand(Command::new("status").about("Show the pending delete queue"))
        .subcommand(
            Command::new("watch")
                .about("Reconcile periodically until interrupted")
                .arg(
                    Arg::new("interval-ms")
                        .short('i')
                        .long("interval-ms")
                        .help("Milliseconds between reconcile runs")
                        .value_name("MS")
                        .value_parser(value_parser!(u64)),
                ),
        )
}

fn post_id_arg() -> Arg {
    Arg::new("id")
        .help("Post id")
        .value_name("ID")
        .value_parser(value_parser!(u64))
}

async fn load_config(matches: &ArgMatches) -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ManagerConfig::from_file(path).await?,
        None => ManagerConfig::default(),
    };

    if let Some(state) = matches.get_one::<String>("state") {
        config.storage.state_db_path = PathBuf::from(state);
    }
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.api.base_url = base_url.clone();
    }

    Ok(config)
}

fn print_posts(session: &PostSession) {
    for post in session.posts().iter() {
        println!("#{:<4} {}", post.id, post.title);
    }
    println!("DELETE QUEUE {}", session.pending_deletions().len());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches).await?;
    let reconcile_config = config.reconcile.clone();
    let mut session = create_session(config).await?;
    let mut unsaved: Option<String> = None;

    match matches.subcommand() {
        Some(("list", _)) => {
            session.load().await;
            print_posts(&session);
        }
        Some(("comments", sub)) => {
            let post_id = *sub.get_one::<u64>("id").ok_or("missing post id")?;
            session.load().await;
            if let Some(post) = session.posts().get(post_id) {
                println!("{}\n", post.title);
            }
            for comment in session.view_comments(post_id).await {
                println!("- {}\n  {}", comment.name, comment.body.replace('\n', "\n  "));
            }
        }
        Some(("delete", sub)) => {
            session.load().await;
            for post_id in sub.get_many::<u64>("id").into_iter().flatten() {
                session.delete_post(*post_id)?;
                info!("🗑️ Queued post {} for deletion", post_id);
            }
            println!("DELETE QUEUE {}", session.pending_deletions().len());
        }
        Some(("reconcile", _)) => {
            let report = session.reconcile().await;
            if report.outcomes.is_empty() {
                println!("Nothing to reconcile");
            } else if !report.is_clean() {
                println!("{} deletions failed and stay queued", report.failed().count());
            }
            unsaved = report.storage_error;
        }
        Some(("refresh", _)) => {
            let report = session.refresh().await?;
            match report.fetched {
                Some(count) => println!("Fetched {} posts", count),
                None => println!("Fetch failed, kept the previous state"),
            }
            if !report.discarded.is_empty() {
                println!("Dropped unresolved deletions: {:?}", report.discarded);
            }
        }
        Some(("status", _)) => {
            println!("Pending: {:?}", session.pending_deletions());
            println!("DELETE QUEUE {}", session.pending_deletions().len());
        }
        Some(("watch", sub)) => {
            let mut reconcile_config = reconcile_config;
            if let Some(interval_ms) = sub.get_one::<u64>("interval-ms") {
                reconcile_config.interval_ms = *interval_ms;
            }

            session.load().await;
            let events = ReconcileScheduler::new(&reconcile_config).start();

            tokio::select! {
                result = session.watch(events) => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("🛑 Interrupted");
                }
            }

            let stats = session.stats();
            info!(
                "Ran {} reconcile passes (last at {}), {} posts visible, {} deletions still queued",
                stats.reconcile_runs,
                stats
                    .last_reconcile_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string()),
                stats.visible_posts,
                stats.queued_deletions
            );
        }
        _ => unreachable!("subcommand_required is set"),
    }

    session.shutdown().await?;

    if let Some(e) = unsaved {
        return Err(format!("delete queue not saved: {}", e).into());
    }
    Ok(())
}

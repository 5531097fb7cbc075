//! chunkfleet - command line client and storage node
//!
//! `chunkfleet node <dir> <port>` runs a storage node. `list`, `get` and
//! `put` talk to the nodes named in the roster file.

use chunkfleet::client::{self, Fleet};
use chunkfleet::config::{ClientConfig, NodeConfig};
use chunkfleet::{logging, node, Error, Result, Roster};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("chunkfleet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Distributed file-chunking store: split files across a fleet of storage nodes")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Roster file (default: $HOME/dfc.conf)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeatable)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(Command::new("list").about("List files stored on the fleet"))
        .subcommand(
            Command::new("get")
                .about("Download files from the fleet")
                .arg(
                    Arg::new("names")
                        .value_name("NAME")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("dest")
                        .short('d')
                        .long("dest")
                        .value_name("DIR")
                        .help("Directory to write downloaded files to")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("."),
                ),
        )
        .subcommand(
            Command::new("put").about("Upload files to the fleet").arg(
                Arg::new("paths")
                    .value_name("FILE")
                    .required(true)
                    .num_args(1..)
                    .value_parser(value_parser!(PathBuf)),
            ),
        )
        .subcommand(
            Command::new("node")
                .about("Run a storage node")
                .arg(
                    Arg::new("dir")
                        .value_name("DIR")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("port")
                        .value_name("PORT")
                        .required(true)
                        .value_parser(value_parser!(u16)),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let verbosity = matches.get_count("verbose");

    if let Err(e) = logging::init_logging(verbosity) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&matches).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` means some file failed
async fn run(matches: &ArgMatches) -> Result<bool> {
    let Some((command, sub)) = matches.subcommand() else {
        return Err(Error::config("no command given"));
    };

    if command == "node" {
        let dir = sub
            .get_one::<PathBuf>("dir")
            .ok_or_else(|| Error::config("missing storage directory"))?;
        let port = *sub
            .get_one::<u16>("port")
            .ok_or_else(|| Error::config("missing port"))?;
        node::run_node(NodeConfig::new(dir, port)).await?;
        return Ok(true);
    }

    let mut config = ClientConfig::default();
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        config.roster_path = path.clone();
    }
    config.validate()?;

    let roster = Roster::from_file(&config.roster_path)?;
    println!("loaded {} servers from config", roster.len());

    let mut fleet = Fleet::connect(roster, &config).await;
    for (position, spec) in fleet.roster().nodes().iter().enumerate() {
        if fleet.is_live(position) {
            println!("connected to server {}", spec);
        } else {
            println!("server {} not available", spec);
        }
    }

    match command {
        "list" => run_list(&mut fleet).await,
        "get" => {
            let dest = sub
                .get_one::<PathBuf>("dest")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            let names: Vec<String> = sub
                .get_many::<String>("names")
                .map(|names| names.cloned().collect())
                .unwrap_or_default();
            Ok(run_get(&mut fleet, &names, &dest).await)
        }
        "put" => {
            let paths: Vec<PathBuf> = sub
                .get_many::<PathBuf>("paths")
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default();
            Ok(run_put(&mut fleet, &paths).await)
        }
        other => Err(Error::config(format!("unknown command '{}'", other))),
    }
}

async fn run_list(fleet: &mut Fleet) -> Result<bool> {
    let entries = client::list(fleet).await?;
    if entries.is_empty() {
        println!("no files found");
    }
    for entry in entries {
        println!("{}", entry);
    }
    Ok(true)
}

async fn run_get(fleet: &mut Fleet, names: &[String], dest: &Path) -> bool {
    let mut all_ok = true;
    for name in names {
        match client::download(fleet, name, dest).await {
            Ok(path) => println!("file {} downloaded to {}", name, path.display()),
            Err(Error::IncompleteFile { name }) => {
                println!("{} is incomplete", name);
                all_ok = false;
            }
            Err(e) => {
                println!("{} get failed: {}", name, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

async fn run_put(fleet: &mut Fleet, paths: &[PathBuf]) -> bool {
    let mut all_ok = true;
    for path in paths {
        match client::upload(fleet, path).await {
            Ok(report) => {
                for outcome in &report.outcomes {
                    match &outcome.result {
                        Ok(()) => println!(
                            "server {}: chunks {} uploaded",
                            outcome.node, outcome.pair
                        ),
                        Err(reason) => {
                            println!("server {}: upload failed - {}", outcome.node, reason)
                        }
                    }
                }
                println!("file {} uploaded", report.name);
            }
            Err(e) => {
                println!("{} put failed: {}", path.display(), e);
                all_ok = false;
            }
        }
    }
    all_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_get_requires_a_name() {
        assert!(cli().try_get_matches_from(["chunkfleet", "get"]).is_err());
        assert!(cli()
            .try_get_matches_from(["chunkfleet", "get", "a", "b"])
            .is_ok());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(cli().try_get_matches_from(["chunkfleet", "fetch"]).is_err());
    }

    #[test]
    fn test_node_port_must_be_numeric() {
        assert!(cli()
            .try_get_matches_from(["chunkfleet", "node", "/tmp/dfs1", "http"])
            .is_err());
        let matches = cli()
            .try_get_matches_from(["chunkfleet", "node", "/tmp/dfs1", "10001"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<u16>("port"), Some(&10001));
    }
}

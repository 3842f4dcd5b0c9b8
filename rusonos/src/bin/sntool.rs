//! Command-line interface to the Sonos network.
//!
//! ```text
//! sntool [-v|-vv] discover [--all] [--timeout SECS]
//! sntool [-v|-vv] groups
//! sntool [-v|-vv] monitor
//! sntool [-v|-vv] queue list <ip>
//! sntool [-v|-vv] queue clear <ip>
//! ```

use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;

use rusonos::{Player, PropertyValue, Service, Sonos};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sntool [-v|-vv] <command>

commands:
  discover [--all] [--timeout SECS]   find players on the local network
  groups                              show the household's group topology
  monitor                             subscribe to events and print them
  queue list <ip>                     list a player's queue
  queue clear <ip>                    empty a player's queue";

fn usage_error(message: &str) -> ExitCode {
    eprintln!("sntool: error: {message}");
    eprintln!("{USAGE}");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut verbosity = 0;
    args.retain(|arg| match arg.as_str() {
        "-v" => {
            verbosity = verbosity.max(1);
            false
        }
        "-vv" => {
            verbosity = 2;
            false
        }
        _ => true,
    });
    init_logging(verbosity);

    let Some(command) = args.first().cloned() else {
        return usage_error("no command given");
    };

    let sonos = Sonos::new();
    let result = match command.as_str() {
        "discover" => discover(&sonos, &args[1..]).await,
        "groups" => groups(&sonos).await,
        "monitor" => monitor(&sonos).await,
        "queue" => queue(&sonos, &args[1..]).await,
        other => {
            return usage_error(&format!("unknown command: {other}"));
        }
    };

    sonos.close().await;

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("sntool: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "rusonos=warn",
        1 => "rusonos=info",
        _ => "rusonos=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn discover(sonos: &Sonos, args: &[String]) -> rusonos::Result<ExitCode> {
    let mut all = false;
    let mut timeout = Duration::from_secs(1);

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--all" | "-a" => all = true,
            "--one" | "-1" => all = false,
            "--timeout" | "-t" => {
                let value = iter.next().and_then(|v| v.parse::<f64>().ok());
                match value {
                    Some(secs) if secs > 0.0 => timeout = Duration::from_secs_f64(secs),
                    _ => return Ok(usage_error("--timeout needs a positive number of seconds")),
                }
            }
            other => return Ok(usage_error(&format!("unknown discover option: {other}"))),
        }
    }

    if all {
        for player in sonos.discover_all(timeout).await? {
            println!("{}", player.ip());
        }
    } else {
        let player = sonos.discover_one(timeout).await?;
        println!("{}", player.ip());
    }
    Ok(ExitCode::SUCCESS)
}

async fn groups(sonos: &Sonos) -> rusonos::Result<ExitCode> {
    let player = sonos.discover_one(Duration::from_secs(3)).await?;
    let network = sonos.get_group_state(&player).await?;
    for group in &network.groups {
        println!("{group}");
        for member in &group.members {
            println!("  {}", member.describe());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn monitor(sonos: &Sonos) -> rusonos::Result<ExitCode> {
    // Topology events only need one player; any will do.
    let player = sonos.discover_one(Duration::from_secs(3)).await?;
    sonos
        .subscribe(
            &player,
            Service::ZoneGroupTopology,
            Box::new(|event| {
                let details = event
                    .properties
                    .get("ZoneGroupState")
                    .and_then(PropertyValue::as_topology)
                    .map(|network| {
                        let coordinators: Vec<String> = network
                            .coordinators()
                            .iter()
                            .map(|p| p.ip().to_string())
                            .collect();
                        format!(": group coordinators: {}", coordinators.join(","))
                    })
                    .unwrap_or_default();
                println!(
                    "received {} event: player {}{details}",
                    event.service.name(),
                    event.player
                );
            }),
            true,
        )
        .await?;

    // Transport events come from each group's coordinator.
    let network = sonos.get_group_state(&player).await?;
    for coordinator in network.coordinators() {
        sonos
            .subscribe(
                &coordinator,
                Service::AVTransport,
                Box::new(|event| {
                    let state = event
                        .properties
                        .get("TransportState")
                        .and_then(PropertyValue::as_text)
                        .unwrap_or("?");
                    let details = event
                        .properties
                        .get("CurrentTrackMetaData")
                        .and_then(PropertyValue::as_track)
                        .map(|track| {
                            format!(
                                ": {} - {}",
                                track.creator.as_deref().unwrap_or("?"),
                                track.title.as_deref().unwrap_or("?")
                            )
                        })
                        .unwrap_or_else(|| " (no track metadata)".to_string());
                    println!(
                        "received {} event: player {} {state}{details}",
                        event.service.name(),
                        event.player
                    );
                }),
                true,
            )
            .await?;
    }

    eprintln!("monitoring; press Ctrl-C to stop");
    let _ = tokio::signal::ctrl_c().await;
    Ok(ExitCode::SUCCESS)
}

async fn queue(sonos: &Sonos, args: &[String]) -> rusonos::Result<ExitCode> {
    let (Some(subcommand), Some(target)) = (args.first(), args.get(1)) else {
        return Ok(usage_error("queue needs a subcommand and a player IP"));
    };
    let Ok(ip) = target.parse::<IpAddr>() else {
        return Ok(usage_error(&format!("not a player IP address: {target}")));
    };
    let player: Player = sonos.get_player(ip);

    match subcommand.as_str() {
        "list" => {
            for item in sonos.get_queue(&player, 0).await? {
                let uris: Vec<&str> = item.res.iter().map(|res| res.uri.as_str()).collect();
                println!(
                    "{} {:?} {:?} {:?} {}",
                    item.id,
                    item.creator.as_deref().unwrap_or(""),
                    item.album.as_deref().unwrap_or(""),
                    item.title.as_deref().unwrap_or(""),
                    uris.join(",")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        "clear" => {
            sonos.clear_queue(&player).await?;
            Ok(ExitCode::SUCCESS)
        }
        other => Ok(usage_error(&format!("unknown queue subcommand: {other}"))),
    }
}

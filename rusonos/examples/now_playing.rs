//! Discover one player and print what its group is playing, then follow
//! transport events until interrupted.
//!
//! Run with: cargo run --example now_playing

use std::time::Duration;

use rusonos::{PropertyValue, Service, Sonos};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rusonos=info")),
        )
        .init();

    let sonos = Sonos::new();

    let player = sonos.discover_one(Duration::from_secs(3)).await?;
    let network = sonos.get_group_state(&player).await?;
    println!("household has {} group(s)", network.groups.len());

    for coordinator in network.coordinators() {
        let transport = sonos.get_transport_info(&coordinator).await?;
        let track = sonos.get_current_track_info(&coordinator).await?;
        println!(
            "{}: {} {} - {}",
            coordinator.describe(),
            transport.state,
            track.artist,
            track.title
        );

        sonos
            .subscribe(
                &coordinator,
                Service::AVTransport,
                Box::new(|event| {
                    if let Some(state) = event
                        .properties
                        .get("TransportState")
                        .and_then(PropertyValue::as_text)
                    {
                        println!("{}: now {state}", event.player);
                    }
                }),
                true,
            )
            .await?;
    }

    println!("listening for transport events; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    sonos.close().await;
    Ok(())
}

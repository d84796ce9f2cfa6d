//! Print state updates from a processor until ctrl-c.
//!
//! ```text
//! RUST_LOG=rotel_rsp1570=debug cargo run --example monitor -- rotel.json
//! ```

use rotel_rsp1570::{RotelConfig, RotelError, RotelMediaPlayer, SerialConnector, StateUpdate};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: monitor <config.json>")?;
    let config = RotelConfig::from_json(&std::fs::read_to_string(&path)?)?;

    let player = RotelMediaPlayer::from_config(&config, Arc::new(SerialConnector))?;
    println!("{} ({}) on {}", player.name(), config.model(), config.device);
    println!("Sources: {}", player.source_list().join(", "));

    let mut updates = player.subscribe();
    player.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(StateUpdate::Feedback(state)) => {
                    println!(
                        "{:?} source={:?} volume={:?} muted={:?} info={:?}",
                        state.power, state.source, state.device_volume, state.is_volume_muted, state.info
                    );
                }
                Ok(StateUpdate::Trigger(state)) => println!("triggers={:?}", state.triggers),
                Ok(StateUpdate::SmartDisplay(state)) => {
                    if let Some(display) = &state.smart_display {
                        for line in display.lines() {
                            println!("| {:<21} |", line);
                        }
                    }
                }
                Ok(StateUpdate::Reset(_)) => println!("Reconnected"),
                Err(RotelError::Lagged(n)) => eprintln!("Missed {} updates", n),
                Err(e) => {
                    eprintln!("Update error: {}", e);
                    break;
                }
            },
        }
    }

    println!("{}", serde_json::to_string_pretty(&player.attributes())?);
    player.shutdown().await;
    Ok(())
}

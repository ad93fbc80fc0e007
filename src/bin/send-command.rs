//! Actuator command utility
//!
//! Publishes a `targetValue` command on the actuator's key-expression and
//! optionally waits for the provider's `currentValue` confirmation.
//!
//! ## Usage
//!
//! ```bash
//! # Turn the actuator on
//! send-command --value true
//!
//! # Turn it off on a remote broker and wait for the confirmation
//! send-command --locator "tcp/192.168.1.10:1883#iface=wlan0" --value false --wait
//! ```

use clap::Parser;
use std::process;
use std::time::Duration;
use uuid::Uuid;
use vss_actuator::locator::Locator;
use vss_actuator::protocol::{OutboundMessage, SignalKind, DEFAULT_KEY_EXPR};
use vss_actuator::transport::mqtt::{MqttSession, SessionConfig};
use vss_actuator::transport::{Publisher, Session};

#[derive(Parser)]
#[command(
    name = "send-command",
    about = "Send a target value to a VSS actuator provider"
)]
struct Args {
    /// Value to request
    #[arg(long, required = true, action = clap::ArgAction::Set)]
    value: bool,

    /// Signal key-expression
    #[arg(long, default_value = DEFAULT_KEY_EXPR)]
    key_expr: String,

    /// Bus locator; empty for the default endpoint
    #[arg(long, default_value = "")]
    locator: String,

    /// Wait for the current-value confirmation
    #[arg(long)]
    wait: bool,

    /// Seconds to wait for the confirmation
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("❌ {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SessionConfig::new(format!("send-command-{}", Uuid::new_v4().simple()));
    config.locator = Locator::parse(&args.locator)?;

    let (host, port) = config.endpoint();
    println!("Connecting to {host}:{port}...");
    let mut session = MqttSession::open(&config).await?;

    let mut subscriber = if args.wait {
        Some(session.declare_subscriber(&args.key_expr).await?)
    } else {
        None
    };

    let publisher = session.declare_publisher(&args.key_expr).await?;
    publisher.put(OutboundMessage::target_value(args.value)).await?;
    println!("📤 Sent targetValue={} on {}", args.value, args.key_expr);

    if let Some(subscriber) = subscriber.as_mut() {
        let wait = async {
            while let Some(message) = subscriber.recv().await {
                if message.kind() == SignalKind::CurrentValue {
                    return Some(message.payload_lossy());
                }
            }
            None
        };

        match tokio::time::timeout(Duration::from_secs(args.timeout_secs), wait).await {
            Ok(Some(value)) => println!("✅ Confirmed currentValue={value}"),
            Ok(None) => println!("⚠️  Session closed before confirmation"),
            Err(_) => println!("⚠️  No confirmation within {}s", args.timeout_secs),
        }
    } else {
        // Give the event loop time to flush the publish
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    session.close().await?;
    Ok(())
}

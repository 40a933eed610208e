// client/src/main.rs
// Command-line front end: signs in with the local development wallet and
// follows transactions, printing what a UI would show.
use std::env;
use std::path::Path;
use std::sync::Arc;

use campus_client::api::HealthReport;
use campus_client::wallet::LOCAL_WALLET_ID;
use campus_client::{AuthEvent, AuthPhase, CampusClient, LocalWallet, SignInOptions, WalletConnector};
use common::{setup_tracing, Config, TxKind};

const USAGE: &str = "usage: campus-client [health | sign-in | whoami | track <tx_id> [kind] | logout]";

fn parse_kind(raw: Option<&String>) -> TxKind {
    raw.and_then(|k| serde_json::from_value(serde_json::Value::String(k.to_lowercase())).ok())
        .unwrap_or(TxKind::Other)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    setup_tracing(&config.log_level);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("sign-in");

    let wallet = Arc::new(LocalWallet::load_or_create(Path::new(&config.client.wallet_key_path))?);
    tracing::info!("Using wallet {}", wallet.address());

    let connectors: Vec<Arc<dyn WalletConnector>> = vec![wallet];
    let client = CampusClient::from_config(config, connectors)?;

    let mut events = client.auth().subscribe();

    match command {
        "health" => match client.api().probe_health().await? {
            HealthReport::System(report) => {
                println!("{} ({:?})", report.service, report.status);
                for (name, component) in report.components {
                    println!("  {}: {:?} {}", name, component.status, component.detail);
                }
            }
            HealthReport::Basic(health) => println!("{}", health.status),
        },
        "sign-in" => {
            client.auth().connect_wallet(LOCAL_WALLET_ID).await?;
            let outcome = client.auth().sign_in(SignInOptions::default()).await?;
            println!("{} signed in as {}", outcome.profile.address, outcome.profile.role);
        }
        "whoami" => {
            if client.auth().bootstrap().await == AuthPhase::Authenticated {
                let access = client.access();
                println!(
                    "role: {:?}, faculty writes: {}, admin writes: {}",
                    access.chain_role, access.can_write_as_faculty, access.can_write_as_admin
                );
            } else {
                println!("Not signed in");
            }
        }
        "track" => {
            let tx_id = args.get(1).ok_or(USAGE)?;
            if client.auth().bootstrap().await != AuthPhase::Authenticated {
                return Err("sign in first".into());
            }
            let tracked = client.tracker().track(tx_id, parse_kind(args.get(2))).await?;
            println!("{}", tracked.summary());
        }
        "logout" => client.auth().logout(None, false).await,
        _ => return Err(USAGE.into()),
    }

    while let Ok(event) = events.try_recv() {
        match event {
            AuthEvent::SignedIn { address, role } => println!("Signed in successfully as {} ({})", address, role),
            AuthEvent::LoggedOut { reason: Some(reason) } => println!("{}", reason),
            AuthEvent::LoggedOut { reason: None } => {}
            AuthEvent::Redirect { path } => println!("-> {}", path),
        }
    }

    Ok(())
}

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{EnvFilter, prelude::*};

use next_bus::{
    config::{Cli, Command},
    departures::client::BoardClient,
    server,
    skill::{Intent, Request, RequestEnvelope, Skill, router::NEXT_BUS_INTENT},
    slots::{FROM_STOP, LINE_NUMBER, RawSlot, TO_STOP},
    stops::store::FileStore,
};

// Stops typed on the command line are taken as recognised.
fn typed_slot(name: &str, value: &str) -> RawSlot {
    RawSlot::new(name, value).with_resolution("ER_SUCCESS_MATCH", &[value])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let store = FileStore::open(&config.store)?;
    let board = BoardClient::new(&config.api_url, &config.access_id);
    let skill = Skill::new(store, board, config.settings());

    match cli.command {
        Command::Serve { listen } => server::serve(Arc::new(skill), listen).await?,
        Command::Next {
            from,
            to,
            line,
            user,
        } => {
            let mut intent = Intent::new(NEXT_BUS_INTENT);
            if let Some(from) = from {
                intent = intent.with_slot(typed_slot(FROM_STOP, &from));
            }
            if let Some(to) = to {
                intent = intent.with_slot(typed_slot(TO_STOP, &to));
            }
            if let Some(line) = line {
                intent = intent.with_slot(typed_slot(LINE_NUMBER, &line));
            }

            let envelope = RequestEnvelope::new(Request::IntentRequest {
                intent,
                dialog_state: None,
            })
            .for_user(&user);

            let response = skill.handle(&envelope, Utc::now()).await.response;
            if let Some(speech) = response.speech_text() {
                println!("{speech}");
            }
            if let Some(card) = response.card {
                println!("due {}", card.title);
            }
        }
    }

    Ok(())
}

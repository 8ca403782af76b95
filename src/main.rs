use chrono::Utc;
use clap::Parser;
use elo_processor::{
    args::{Args, Command},
    database::{db::DbClient, RatingStore},
    error::ProcessorError,
    messaging::{PeriodProcessedMessage, RabbitMqConfig, RabbitMqPublisher},
    model::{
        decay::apply_decay,
        leaderboard::rank_population,
        processor::process_period,
        replay::replay_population,
        structures::period_calendar::PeriodCalendar
    }
};
use futures::future::try_join_all;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level);

    let client = match DbClient::connect(&args.connection_string).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let publisher = connect_publisher().await;

    match run(&client, args.command, publisher.as_ref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
}

/// Notifications are optional; a broker that cannot be reached only costs a warning
async fn connect_publisher() -> Option<RabbitMqPublisher> {
    let config = match RabbitMqConfig::from_env() {
        Ok(config) if config.enabled => config,
        Ok(_) => return None,
        Err(e) => {
            warn!("RabbitMQ enabled but misconfigured: {}", e);
            return None;
        }
    };

    match RabbitMqPublisher::connect_from_config(&config).await {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            warn!("Failed to connect to RabbitMQ, notifications disabled: {}", e);
            None
        }
    }
}

async fn notify(publisher: Option<&RabbitMqPublisher>, population_id: i32, period_id: i32, action: &str) {
    let Some(publisher) = publisher else {
        return;
    };

    let message = PeriodProcessedMessage {
        population_id,
        period_id,
        action: action.to_string(),
        processed_at: Utc::now(),
        correlation_id: None
    };

    if let Err(e) = publisher.publish_period_processed(&message).await {
        warn!(population_id, period_id, "Failed to publish notification: {}", e);
    }
}

async fn run(client: &DbClient, command: Command, publisher: Option<&RabbitMqPublisher>) -> Result<(), ProcessorError> {
    let calendar = PeriodCalendar::default();

    match command {
        Command::Migrate => client.migrate().await?,
        Command::Process { population, period } => {
            let period = match period {
                Some(period) => period,
                None => calendar.period_for(Utc::now())?
            };
            let outcome = process_period(client, population, period, calendar.start_of(period)?).await?;

            if outcome.calculated {
                notify(publisher, population, period, "processed").await;
            } else {
                info!(population_id = population, period_id = period, "Nothing to process");
            }
        }
        Command::Replay { population, all } => {
            let populations = match (population, all) {
                (_, true) => client.list_populations().await?,
                (Some(population), false) => vec![population],
                (None, false) => Vec::new()
            };

            let summaries = try_join_all(populations.iter().map(|&p| replay_population(client, p, &calendar))).await?;

            for summary in summaries {
                let last_period = client
                    .list_periods_chronological(summary.population_id)
                    .await?
                    .last()
                    .copied()
                    .unwrap_or(0);
                notify(publisher, summary.population_id, last_period, "replayed").await;
            }
        }
        Command::Decay { population } => {
            let populations = match population {
                Some(population) => vec![population],
                None => client.list_populations().await?
            };

            let now = Utc::now();
            for population_id in populations {
                apply_decay(client, population_id, now).await?;
            }
        }
        Command::Leaderboard {
            population,
            window,
            limit
        } => {
            let filter = window.filter(&calendar, Utc::now())?;
            let entries = rank_population(client, population, filter).await?;

            for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
    }

    Ok(())
}

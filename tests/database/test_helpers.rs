use elo_processor::{
    database::{db::DbClient, RatingStore},
    model::structures::score::Score,
    utils::test_utils::generate_result
};
use lazy_static::lazy_static;
use std::sync::Arc;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::postgres::Postgres;

pub struct TestDatabase {
    pub connection_string: String,
    _container: Container<'static, Postgres>
}

impl TestDatabase {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Create a static CLI instance
        lazy_static! {
            static ref DOCKER: Arc<Cli> = Arc::new(Cli::default());
        }

        // Start PostgreSQL container
        let container = DOCKER.run(Postgres::default());
        let port = container.get_host_port_ipv4(5432);

        let connection_string = format!(
            "host=localhost port={} user=postgres password=postgres dbname=postgres",
            port
        );

        let client = DbClient::connect(&connection_string).await?;
        client.migrate().await?;

        Ok(TestDatabase {
            connection_string,
            _container: container
        })
    }

    pub async fn get_client(&self) -> Result<DbClient, Box<dyn std::error::Error>> {
        Ok(DbClient::connect(&self.connection_string).await?)
    }

    /// Three players over three days in population 1:
    /// day 1 all three play, day 2 only players 1 and 2, day 3 player 3 alone.
    pub async fn seed_test_data(&self) -> Result<(), Box<dyn std::error::Error>> {
        let client = self.get_client().await?;

        let results = [
            (1, 1, Score::Two),
            (2, 1, Score::Four),
            (3, 1, Score::Fail),
            (1, 2, Score::Five),
            (2, 2, Score::Three),
            (3, 3, Score::One)
        ];

        for (player_id, period_id, score) in results {
            client.record_result(1, generate_result(player_id, period_id, score)).await?;
        }

        Ok(())
    }
}

mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use common_charges::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

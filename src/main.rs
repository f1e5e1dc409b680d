use std::env;
use std::fs;

use log::{info, warn};

use listings_processor::config;
use listings_processor::error::{AppError, Context, Result};
use listings_processor::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Some(input_path) = env::args().nth(1) else {
        return Err(AppError::message(
            "Usage: listings-processor <listings.csv>",
        ));
    };

    let config = config::from_env()?;
    let content = fs::read(&input_path)
        .with_context(|| format!("Failed to read input CSV {}", input_path))?;

    let pipeline = Pipeline::new(&config)?;
    match pipeline.process_stream(&content).await? {
        Some(path) => info!("Done. Enriched listings at {}", path.display()),
        None => warn!("Input CSV could not be parsed; no output produced"),
    }

    Ok(())
}

use clap::Parser;

use sql_gateway::{
    adapters,
    cli::Args,
    error::{AppError, AppResult},
    logging,
};

fn main() -> AppResult<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    rt.block_on(adapters::http::run(args))
}

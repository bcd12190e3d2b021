use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = mizan_api::Args::parse();
	mizan_api::run(args).await
}

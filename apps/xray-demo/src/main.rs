use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = xray_demo::Args::parse();

	xray_demo::run(args).await
}

use clap::Parser;
use docrag_cli::{Cli, init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let output = run(cli).await?;
    println!("{output}");
    Ok(())
}

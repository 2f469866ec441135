use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "lake-etl")]
#[command(about = "Incremental market-data lake ETL (raw -> clean -> aggregate)")]
pub struct CliConfig {
    #[arg(long, default_value = "config/lake.toml")]
    pub config: String,

    #[arg(long, help = "Override the local storage root from the config file")]
    pub data_root: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

// cli.rs - Command-line interface configuration
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "space-backdrop")]
#[command(about = "Animated space backdrop", long_about = None)]
pub struct Cli {
    /// Scene configuration file (JSON); defaults are used when omitted
    #[arg(long = "config")]
    pub config: Option<std::path::PathBuf>,

    /// Override the number of stars
    #[arg(long = "stars")]
    pub stars: Option<usize>,

    /// Disable the bloom effect
    #[arg(long = "no-bloom", default_value = "false")]
    pub no_bloom: bool,

    /// Initial window width
    #[arg(long = "width", default_value = "1280")]
    pub width: u32,

    /// Initial window height
    #[arg(long = "height", default_value = "720")]
    pub height: u32,
}

mod exit;
mod logging;
mod serve;

use clap::Parser;

use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(
    name = "guibridge",
    version,
    about = "GUI bridge worker speaking framed JSON on stdin/stdout"
)]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", env = "GUIBRIDGE_LOG_FORMAT")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", env = "GUIBRIDGE_LOG_LEVEL")]
    log_level: LogLevel,

    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match serve::run(cli.serve) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

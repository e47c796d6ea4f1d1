mod cli;

use clap::Parser;
use std::io::Write;

use cli::{Args, Command};
use dentcam::config::Config;

/// Time-of-day stamp at the start of every log line.
const LOG_TIME_FORMAT: &str = "%H:%M:%S";

/// Log lines as `[HH:MM:SS][LEVEL] module:line: message`.
fn init_logs(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}][{}] {}:{}: {}",
                chrono::Local::now().format(LOG_TIME_FORMAT),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

fn main() {
    let args = Args::parse();
    init_logs(&args.log_level);

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Command::ListCameras { max } => cli::list_cameras(&config, max),
        Command::Stream { camera, seconds } => cli::stream(&config, &camera, seconds),
        Command::Snap {
            camera,
            folder,
            output,
        } => cli::snap(&config, &camera, &folder, output.as_deref()),
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

use std::process::ExitCode;

use valor_lib::logging::{init_logging, LogFormat};
use valor_lib::settings::{print_usage, Mode, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env_and_args() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("error: {}", msg);
            print_usage();
            return ExitCode::from(2);
        }
    };

    if settings.mode == Mode::Help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    init_logging(&settings.log_filter, LogFormat::from_features());
    log::debug!("starting valor {}", env!("CARGO_PKG_VERSION"));

    valor_lib::run(settings).await
}

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info_span};

use batchscore_cli::{Cli, EXIT_USAGE, execute};
use batchscore_platform::HttpPlatform;

fn main() -> ExitCode {
    let cli = Cli::parse();
    batchscore_observability::init_with(cli.log_format);

    let correlation_id = cli.correlation_id.unwrap_or_default();
    let span = info_span!(
        "perform_inference",
        correlation_id = %correlation_id,
        site = %cli.site_name
    );
    let _guard = span.enter();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let platform = match HttpPlatform::new(settings.platform.clone()) {
        Ok(platform) => platform,
        Err(e) => {
            error!(error = %e, "invalid platform configuration");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    ExitCode::from(execute(&settings, &platform, correlation_id))
}

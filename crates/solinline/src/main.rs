use cli::{CliApp, ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // Logs go to stderr so flattened source on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solinline=info,cli=info,resolver=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match CliApp::run() {
        Ok(code) => code,
        Err(e) => {
            let code = ExitCode::for_error(&e);
            eprintln!("{}: {:#}", code.explanation(), e);
            code
        }
    };

    std::process::exit(code.as_code());
}

use std::process::ExitCode;

use nav_report::config::AppConfig;
use nav_report::logging;
use nav_report::mailbox::Pop3Connector;
use nav_report::notify::SmtpNotifier;
use nav_report::pipeline::Pipeline;

fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    let path = AppConfig::default_path();

    let config = match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            logging::init_fallback();
            tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init(&config.logging);

    eprintln!("📈 NAV report v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Config: {}", path.display());
    eprintln!("   Products: {}", config.products.len());

    let connector = Pop3Connector::new(&config.mailbox);
    let notifier = SmtpNotifier::new(&config.smtp);
    let outcome = Pipeline::new(&config, &connector, &notifier).run();
    tracing::info!(?outcome, "Done");

    ExitCode::from(outcome.exit_code())
}

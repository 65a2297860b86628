use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quizgen::config::{ProcessEnv, ServiceConfig};
use quizgen::llm::{CompletionBackend, GenerationClient};
use quizgen::server::Server;
use quizgen::{Request, service};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quizgen=info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "quizgen exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env(&ProcessEnv)?;
    let backend = config.build_backend()?;
    info!(
        backend = backend.name(),
        model = backend.model(),
        timeout = ?config.attempt_timeout,
        "generation backend ready"
    );

    let client = GenerationClient::new(backend)
        .with_retry_policy(config.retry_policy())
        .with_feedback_contract(config.feedback_contract);
    let pipeline = service::pipeline(client, config.allowed_origins.iter().cloned());

    let server = Server::bind(&config.bind_addr).await?;
    server
        .run_until(
            move |req: Request| {
                let pipeline = pipeline.clone();
                async move { pipeline.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    info!("quizgen stopped");
    Ok(())
}

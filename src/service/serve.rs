use crate::db;
use crate::error::FlagsError;
use crate::server::router::{FlagsState, flags_router};
use crate::service::cache::PhenotypeCache;
use crate::service::handshake::{ServiceBootstrap, ready_line};
use crate::utils::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Runs the privileged service until its caller goes away.
///
/// Reads the bootstrap line from stdin, opens the database, announces the
/// listening address on stdout and serves until stdin closes or a
/// termination signal arrives.
pub async fn run() -> Result<(), FlagsError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let first = lines
        .next_line()
        .await?
        .ok_or_else(|| FlagsError::InvalidValue("stdin closed before bootstrap".to_string()))?;
    let bootstrap: ServiceBootstrap = serde_json::from_str(&first)?;

    init_tracing(&bootstrap.loglevel);

    if bootstrap.token.trim().is_empty() {
        return Err(FlagsError::InvalidValue(
            "bootstrap token must be non-empty".to_string(),
        ));
    }

    let db = db::spawn(bootstrap.database.clone()).await?;
    let state = FlagsState::new(
        db.clone(),
        PhenotypeCache::new(&bootstrap.cache),
        Arc::from(bootstrap.token.as_str()),
    );
    let app = flags_router(state);

    let listener = TcpListener::bind(SocketAddr::new(bootstrap.listen_addr, 0)).await?;
    let addr = listener.local_addr()?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(ready_line(addr).as_bytes()).await?;
    stdout.flush().await?;
    info!(
        %addr,
        pid = std::process::id(),
        database = %bootstrap.database.path.display(),
        "Privileged flag service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(lines))
        .await?;

    db.stop();
    info!("Privileged flag service has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal(mut lines: Lines<BufReader<Stdin>>) {
    let caller_gone = async {
        // Anything after the bootstrap line is ignored; only EOF matters.
        while let Ok(Some(_)) = lines.next_line().await {}
        info!("Caller closed stdin");
    };

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = caller_gone => {},
        () = ctrl_c => {},
        () = terminate => {},
    }
}

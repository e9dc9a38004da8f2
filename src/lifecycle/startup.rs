//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Order: validate config, build the contract, bind, then watch and serve
//! - Listeners start last (traffic only when the contract is ready)

use std::io;
use std::net::SocketAddr;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::loader::{validate, validate_mock};
use crate::config::{ConfigError, DocumentConfig, DocumentWatcher, ListenerConfig, MockConfig, ProxyConfig};
use crate::document::{ContractSnapshot, DocumentError, DocumentPipeline};
use crate::http::{HttpServer, ServerHandle};
use crate::mock::MockServer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to watch API document: {0}")]
    Watch(#[from] notify::Error),
    #[error("failed to start server: {0}")]
    Serve(#[source] io::Error),
}

/// A started server plus the watcher feeding it.
pub struct Running {
    server: ServerHandle,
    // Dropping the watcher stops reloads.
    _watcher: Option<RecommendedWatcher>,
}

impl Running {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Shut down and wait until the port is free again.
    pub async fn shutdown(self) -> io::Result<()> {
        self.server.shutdown().await
    }
}

/// Validate, build the contract, bind, and serve the proxy.
pub async fn start_proxy(config: ProxyConfig) -> Result<Running, StartupError> {
    validate(&config)?;

    let pipeline = DocumentPipeline::new(config.validation.strict);
    let snapshot = pipeline.build(&config.document.path)?;
    let listener = bind(&config.listener).await?;
    let (watcher, updates) = watch(&config.document, pipeline)?;

    let address = listener.local_addr().map_err(StartupError::Serve)?;
    tracing::info!(address = %address, target = %config.target.url, "Proxy ready");
    let server = HttpServer::new(config, snapshot)
        .spawn(listener, updates)
        .map_err(StartupError::Serve)?;
    Ok(Running {
        server,
        _watcher: watcher,
    })
}

/// Validate, build the contract, bind, and serve the mock responder.
pub async fn start_mock(config: MockConfig) -> Result<Running, StartupError> {
    validate_mock(&config)?;

    let pipeline = DocumentPipeline::new(false);
    let snapshot = pipeline.build(&config.document.path)?;
    let listener = bind(&config.listener).await?;
    let (watcher, updates) = watch(&config.document, pipeline)?;

    let address = listener.local_addr().map_err(StartupError::Serve)?;
    tracing::info!(address = %address, "Mock server ready");
    let server = MockServer::new(&config, snapshot)
        .spawn(listener, updates)
        .map_err(StartupError::Serve)?;
    Ok(Running {
        server,
        _watcher: watcher,
    })
}

async fn bind(listener: &ListenerConfig) -> Result<TcpListener, StartupError> {
    let address = listener.bind_address();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

type Watch = (Option<RecommendedWatcher>, mpsc::UnboundedReceiver<ContractSnapshot>);

fn watch(document: &DocumentConfig, pipeline: DocumentPipeline) -> Result<Watch, StartupError> {
    if document.watch {
        let (watcher, updates) = DocumentWatcher::new(&document.path, document.watch_location(), pipeline);
        Ok((Some(watcher.run()?), updates))
    } else {
        // Sender dropped at once: the server sees a closed update stream.
        let (_, updates) = mpsc::unbounded_channel();
        Ok((None, updates))
    }
}

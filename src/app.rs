use crate::config::{AppConfig, HTTPConfig};
use crate::http::create_app;
use crate::relay::Relay;
use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[cfg(feature = "sentry")]
pub type SentryGuard = Option<sentry::ClientInitGuard>;

#[cfg(not(feature = "sentry"))]
pub type SentryGuard = Option<()>;

pub struct AppHandles {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    _sentry_guard: SentryGuard,
}
impl AppHandles {
    pub fn new(config: AppConfig, _sentry_guard: SentryGuard) -> Result<AppHandles> {
        let relay = Relay::new(&config)?;
        info!(
            "Relaying Slack messages through completion model {}",
            config.completion.model
        );

        let http_handle = Self::start_http_server(config.http, relay, _sentry_guard.is_some());
        Ok(AppHandles {
            tasks: vec![("HTTP Server", http_handle)],
            _sentry_guard,
        })
    }

    pub async fn run(self) {
        let futures: Vec<_> = self
            .tasks
            .into_iter()
            .map(|(name, handle)| {
                info!("Starting task: {name}");
                Box::pin(async move {
                    match handle.await {
                        Ok(_) => error!("{name} task completed!"),
                        Err(e) => error!("{name} task failed: {e:?}!"),
                    }
                })
            })
            .collect();

        // Wait for any task to complete. All handles are boxed, so when dropped they are cancelled.
        let (_, _, remaining) = futures::future::select_all(futures).await;
        drop(remaining);
    }

    fn start_http_server(config: HTTPConfig, relay: Relay, sentry_enabled: bool) -> JoinHandle<()> {
        let address = config.address;
        let app = create_app(relay, sentry_enabled);

        tokio::spawn(async move {
            let result = match config.tls {
                Some(_tls_config) => {
                    #[cfg(feature = "tls-rustls")]
                    {
                        info!("Starting HTTPS (secure) server on {address}");
                        let _ = rustls::crypto::CryptoProvider::install_default(
                            rustls::crypto::aws_lc_rs::default_provider(),
                        );
                        match axum_server::tls_rustls::RustlsConfig::from_pem_file(
                            &_tls_config.certificate_path,
                            &_tls_config.key_path,
                        )
                        .await
                        {
                            Ok(tls) => axum_server::bind_rustls(address, tls)
                                .serve(app.into_make_service())
                                .await
                                .map_err(anyhow::Error::from),
                            Err(e) => Err(anyhow::anyhow!(
                                "Failed to load rustls TLS certificates: {e}"
                            )),
                        }
                    }

                    #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                    {
                        info!("Starting HTTPS (secure) server on {address}");
                        match axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                            &_tls_config.certificate_path,
                            &_tls_config.key_path,
                        ) {
                            Ok(tls) => axum_server::bind_openssl(address, tls)
                                .serve(app.into_make_service())
                                .await
                                .map_err(anyhow::Error::from),
                            Err(e) => Err(anyhow::anyhow!(
                                "Failed to load openssl TLS certificates: {e}"
                            )),
                        }
                    }

                    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                    Err(anyhow::anyhow!(
                        "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                    ))
                }
                None => {
                    info!("Starting HTTP (insecure) server on {address}");
                    axum_server::bind(address)
                        .serve(app.into_make_service())
                        .await
                        .map_err(anyhow::Error::from)
                }
            };

            if let Err(e) = result {
                error!("Server error: {e:?}");
            }
        })
    }
}

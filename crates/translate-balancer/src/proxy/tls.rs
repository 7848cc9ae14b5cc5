//! TLS client configuration for upstream connections.

use crate::config::UpstreamTlsConfig;
use anyhow::Context;
use hyper_rustls::ConfigBuilderExt;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SupportedProtocolVersion};
use std::sync::Arc;
use tracing::warn;

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked against the presented key.
///
/// # Warning
/// Use only against development endpoints with self-signed certificates.
#[derive(Debug)]
pub struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl NoVerifier {
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build the rustls client configuration for upstream connections.
///
/// Native root certificates are only loaded when `load_roots` is set, so a
/// pool of plain-http endpoints starts on hosts without a CA bundle.
pub fn client_tls_config(
    tls: &UpstreamTlsConfig,
    load_roots: bool,
) -> Result<ClientConfig, anyhow::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions = if tls.max_tls12 {
        TLS12_ONLY
    } else {
        rustls::DEFAULT_VERSIONS
    };

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(versions)
        .context("Failed to select TLS protocol versions")?;

    let config = if tls.skip_verify {
        warn!("TLS certificate verification DISABLED for upstream endpoints (development/testing only)");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier::new(provider)))
            .with_no_client_auth()
    } else if load_roots {
        builder
            .with_native_roots()
            .context("Failed to load native root certificates")?
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth()
    };

    Ok(config)
}

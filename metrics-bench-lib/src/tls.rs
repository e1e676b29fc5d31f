use rama::{
    error::{BoxError, ErrorContext as _},
    net::tls::{
        self, ApplicationProtocol,
        server::{SelfSignedData, ServerAuth},
    },
    tls::boring::server::{TlsAcceptorData, TlsAcceptorLayer},
};

use crate::utils;

/// Create a TLS acceptor backed by a freshly generated self-signed certificate.
///
/// Nothing is persisted: every process start gets a new certificate.
pub fn new_self_signed_tls_acceptor_layer() -> Result<TlsAcceptorLayer, BoxError> {
    Ok(TlsAcceptorLayer::new(try_new_self_signed_server_data()?))
}

fn try_new_self_signed_server_data() -> Result<TlsAcceptorData, BoxError> {
    let tls_server_config = tls::server::ServerConfig {
        application_layer_protocol_negotiation: Some(vec![
            ApplicationProtocol::HTTP_2,
            ApplicationProtocol::HTTP_11,
        ]),
        ..tls::server::ServerConfig::new(ServerAuth::SelfSigned(SelfSignedData {
            organisation_name: Some(utils::env::project_name().to_owned()),
            ..Default::default()
        }))
    };
    let data: TlsAcceptorData = tls_server_config
        .try_into()
        .context("create self-signed tls server config")?;
    Ok(data)
}

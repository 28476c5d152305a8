/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::pem::PemObject;

use crate::ClientError;

/// Certificate chain and private key presented to the server.
///
/// Installing one on a stream enables the SASL EXTERNAL mechanism.
pub struct ClientCertificate {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientCertificate {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        ClientCertificate { chain, key }
    }

    /// Loads a PEM encoded certificate chain and private key.
    pub fn from_pem_files(
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, ClientError> {
        let load_error = |err: rustls::pki_types::pem::Error| {
            ClientError::ClientCertificateLoad(err.to_string())
        };
        let chain = CertificateDer::pem_file_iter(cert_file)
            .map_err(load_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(load_error)?;
        if chain.is_empty() {
            return Err(ClientError::ClientCertificateLoad(
                "no certificate in file".to_string(),
            ));
        }
        let key = PrivateKeyDer::from_pem_file(key_file).map_err(load_error)?;
        Ok(ClientCertificate { chain, key })
    }
}

impl Clone for ClientCertificate {
    fn clone(&self) -> Self {
        ClientCertificate {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

fn tls_config(certificate: Option<&ClientCertificate>) -> Result<ClientConfig, ClientError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let builder = ClientConfig::builder().with_root_certificates(roots);
    match certificate {
        Some(certificate) => builder
            .with_client_auth_cert(certificate.chain.clone(), certificate.key.clone_key())
            .map_err(|err| ClientError::ClientCertificate(err.to_string())),
        None => Ok(builder.with_no_client_auth()),
    }
}

/// Client side TLS state for the XMPP domain, verified against the
/// webpki root store.
pub(super) fn client_connection(
    domain: &str,
    certificate: Option<&ClientCertificate>,
) -> Result<ClientConnection, ClientError> {
    let config = tls_config(certificate)?;
    let server_name = ServerName::try_from(domain.to_string())
        .map_err(|err| ClientError::Tls(err.to_string()))?;
    ClientConnection::new(Arc::new(config), server_name)
        .map_err(|err| ClientError::Tls(err.to_string()))
}

//! Directory session.
//!
//! Dialing is retried with [`Backoff`] until it succeeds or fails on a
//! certificate problem. Bind and identity checks are never retried.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use ldap3::exop::{WhoAmI, WhoAmIResp};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::retry::{retry, Backoff, RetryError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns false when retrying cannot help, i.e. when the server
/// certificate failed verification.
#[must_use]
pub fn is_error_recoverable(error: &LdapError) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if is_certificate_error(err) {
            return false;
        }
        // io::Error::source() skips the wrapped error itself.
        current = match err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            Some(inner) => Some(inner as &(dyn StdError + 'static)),
            None => err.source(),
        };
    }
    true
}

fn is_certificate_error(err: &(dyn StdError + 'static)) -> bool {
    if let Some(tls) = err.downcast_ref::<rustls::Error>() {
        return matches!(tls, rustls::Error::InvalidCertificate(_));
    }
    err.to_string().to_ascii_lowercase().contains("certificate")
}

/// An authenticated directory connection.
pub struct DirectorySession {
    ldap: Ldap,
    uri: String,
    authzid: String,
}

impl std::fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySession")
            .field("uri", &self.uri)
            .field("authzid", &self.authzid)
            .finish_non_exhaustive()
    }
}

impl DirectorySession {
    /// Dials `uri`, binds as `binddn` when given and asks the server who we
    /// are.
    ///
    /// # Errors
    ///
    /// - [`Error::DirectoryConnect`] when dialing fails on a certificate error
    /// - [`Error::DirectoryBind`] when the server rejects the credentials
    /// - [`Error::DirectoryIdentity`] when the whoami request fails
    /// - [`Error::Cancelled`] when `cancel` fires while dialing
    pub async fn connect(
        uri: &str,
        binddn: Option<&str>,
        password: Option<&str>,
        backoff: &Backoff,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let settings = LdapConnSettings::new().set_conn_timeout(CONNECT_TIMEOUT);

        debug!(uri, "Dialing LDAP directory.");
        let (conn, mut ldap) = retry(
            backoff,
            cancel,
            || LdapConnAsync::with_settings(settings.clone(), uri),
            is_error_recoverable,
            |attempt, error| warn!(attempt, uri, %error, "LDAP directory unreachable."),
        )
        .await
        .map_err(|err| match err {
            RetryError::Cancelled => Error::Cancelled,
            RetryError::Fatal(source) => Error::DirectoryConnect {
                uri: uri.to_string(),
                source,
            },
        })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error.");
            }
        });

        if let Some(binddn) = binddn {
            debug!(binddn, "Binding to LDAP directory.");
            ldap.simple_bind(binddn, password.unwrap_or_default())
                .await
                .and_then(LdapResult::success)
                .map_err(|source| Error::DirectoryBind {
                    binddn: binddn.to_string(),
                    source,
                })?;
        }

        let (exop, _) = ldap
            .extended(WhoAmI)
            .await
            .and_then(|result| result.success())
            .map_err(Error::DirectoryIdentity)?;
        let authzid = exop.parse::<WhoAmIResp>().authzid;

        info!(uri, authzid = %authzid, "Connected to LDAP directory.");
        Ok(Self {
            ldap,
            uri: uri.to_string(),
            authzid,
        })
    }

    /// Authorization identity reported by the server, e.g. `dn:cn=admin,...`.
    #[must_use]
    pub fn authzid(&self) -> &str {
        &self.authzid
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The underlying handle, for searches.
    pub fn handle(&mut self) -> &mut Ldap {
        &mut self.ldap
    }

    /// Closes the session.
    pub async fn close(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "Error during LDAP unbind.");
        }
    }
}

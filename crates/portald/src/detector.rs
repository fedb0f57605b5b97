use portal_client::{ConnectivityProbe, PortalError, PortalSession};
use thiserror::Error;
use tokio::sync::Mutex;

/// Why a detection attempt concluded the host is offline.
///
/// Detection fails closed: every error counts as offline.
#[derive(Error, Debug)]
pub enum Offline {
    #[error("not logged in at the portal")]
    NotLoggedIn,

    #[error("user info query failed: {0}")]
    Query(#[source] PortalError),

    #[error("connectivity probe returned unexpected content")]
    ProbeMismatch,

    #[error("connectivity probe failed: {0}")]
    Probe(#[source] PortalError),
}

/// Strategy for deciding whether the host is online.
#[derive(Debug)]
pub enum OnlineDetector {
    /// Ask the authentication server. Refreshes the session's client IP.
    AuthServer,
    /// Fetch a connectivity-check page.
    Probe(ConnectivityProbe),
}

impl OnlineDetector {
    /// `Ok(())` when online.
    pub async fn check(&self, session: &Mutex<PortalSession>) -> Result<(), Offline> {
        match self {
            Self::AuthServer => {
                let info = session
                    .lock()
                    .await
                    .query_user_info()
                    .await
                    .map_err(Offline::Query)?;
                if info.logged_in {
                    Ok(())
                } else {
                    Err(Offline::NotLoggedIn)
                }
            }
            Self::Probe(probe) => match probe.check().await {
                Ok(true) => Ok(()),
                Ok(false) => Err(Offline::ProbeMismatch),
                Err(err) => Err(Offline::Probe(err)),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthServer => "auth",
            Self::Probe(_) => "probe",
        }
    }
}

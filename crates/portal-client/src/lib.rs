//! Client side of the SRUN-style captive portal protocol.
//!
//! - [`PortalSession`] owns one authenticated identity and talks to the
//!   authentication server (user info, challenge, login, logout).
//! - [`ChallengeSigner`] turns a challenge into the opaque login fields;
//!   [`SrunSigner`] implements the public `srun_bx1` scheme.
//! - [`ConnectivityProbe`] checks a well-known page independently of the
//!   portal.
//! - [`transport`] builds the HTTP client, optionally bound to an interface
//!   or local address.

mod error;
mod jsonp;
mod probe;
mod schema;
mod session;
mod signer;
pub mod transport;
mod xencode;

pub use error::{PortalError, PortalResult, SignerError};
pub use jsonp::strip_jsonp;
pub use probe::ConnectivityProbe;
pub use session::{PortalSession, SessionConfig, UserInfo};
pub use signer::{ChallengeSigner, SignRequest, SignedCredentials, SrunSigner};
pub use transport::TransportOptions;

/// Access-controller id sent with every login and logout.
pub const AC_ID: &str = "1";

/// JSONP callback name requested on every call.
pub const JSONP_CALLBACK: &str = "jQuery";

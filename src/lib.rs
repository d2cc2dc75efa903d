#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod client;
pub mod codec;
pub mod error;
pub mod flow;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use error::{BoxError, Error};

pub use codec::{
    ThirdPartyCaveat, authorization_header, bind_discharge, extract_caveat_id, select_caveat,
};
pub use flow::{
    Outcome, ProtectedBackend, ProtectedReply, Rejection, discharge_required, fetch_protected,
    resolve_rejection,
};
pub use session::{
    AuthPhase, Credentials, DISCHARGE_KEY, IDENTITY_KEY, ROOT_KEY, SessionStore,
    clear_credentials, complete_login, store_discharge, store_root,
};
pub use types::{
    Account, BackendResponse, CaveatId, DischargeToken, RootToken, SessionId,
    VerifiedAuthorization,
};

#[cfg(feature = "client")]
pub use client::{AuthClient, StoreConfig};

pub mod credential;
pub mod error;
pub mod handshake;
pub mod session;

pub use credential::{CredentialStore, HandshakeOffer, KeyOrigin};
pub use error::*;
pub use handshake::{authenticate, seal_api_key};
pub use session::{SessionKey, SessionPolicy, SessionRegistry};

//! Domain layer: pure protocol logic with no I/O.

pub mod blame;
pub mod notifier;
pub mod party;
pub mod request;
pub mod round;
pub mod routing;

pub use blame::{Blame, BlameNode};
pub use notifier::SignatureNotifier;
pub use party::{Party, PartyInfo};
pub use request::{
    KeygenRequest, KeygenResponse, KeysignRequest, KeysignResponse, RegroupRequest, RegroupResponse, Signature, Status,
};
pub use round::{check_unicast, Algorithm, Operation, RoundInfo, RoundMessage};
pub use routing::{MessageRouting, RoundKey, WireMessage};

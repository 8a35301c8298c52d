pub mod encoding;
pub mod messages;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod relay;
pub mod subscription;
pub mod traits;

pub use messages::{BroadcastConfirm, JoinPartyMessage, MessageType, TaskDone, TssControl, WrappedMessage};
pub use relay::broadcast_with_retry;
pub use subscription::SubscriptionRegistry;
pub use traits::{Communication, InboundMessage, Mailbox, MailboxSender, Subscription};

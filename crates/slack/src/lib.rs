//! Slack integration - Events API webhook interface
//!
//! This crate provides the Slack side of slack2doc:
//! - **Signatures** (`signature`) - `v0` HMAC-SHA256 request verification with replay window
//! - **Events** (`events`) - typed Events API envelope, message classification
//! - **Users** (`users`) - `users.info` display-name lookup
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Event Subscriptions and point the request URL at the configured endpoint
//! 3. Subscribe to `message.channels` (and `message.groups` for private channels)
//! 4. Put the app's signing secret in the secrets file (`signing_secret`)
//!
//! # Architecture
//!
//! ```text
//! POST endpoint → SignatureVerifier → parse_event → channel filter → DocumentAppender
//!                                          ↓
//!                                   UserDirectory (author name)
//! ```

pub mod events;
pub mod signature;
pub mod users;

pub use events::{parse_event, EnvelopeError, MessageEvent, SlackEvent};
pub use signature::{compute_signature, SignatureError, SignatureVerifier, SignedRequest};
pub use users::{DirectoryError, PassthroughUserDirectory, SlackWebUserDirectory, UserDirectory};

//! Support chat for field technicians.
//!
//! A turn flows through [`ChatEngine`]: the message is stored by the
//! [`SessionStore`], knowledge is retrieved, the [`ConfidenceRouter`] picks
//! Direct, Synthesize or Clarify, and the reply is stored in the
//! [`Persona`]'s voice.

pub mod engine;
pub mod error;
pub mod generator;
pub mod persona;
pub mod router;
pub mod session;
pub mod sweeper;

pub use engine::{ChatEngine, TurnResponse, MAX_MESSAGE_LENGTH};
pub use error::ChatError;
pub use generator::{CompletionTransport, DialectGenerator, GenerationRequest, Generator};
pub use persona::Persona;
pub use router::{confidence, ConfidenceRouter, RoutedReply, RoutingDecision, RoutingReason, Strategy};
pub use session::SessionStore;
pub use sweeper::SessionSweeper;

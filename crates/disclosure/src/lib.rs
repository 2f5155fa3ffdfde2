//! Notarized selective disclosure of HTTPS exchanges.
//!
//! A [`SessionOrchestrator`] drives one notarization session end to end: it
//! starts a fresh engine behind an
//! [`ExecutionBoundary`](disclosure_boundary::ExecutionBoundary), links a
//! prover to the notary, sends the request through the WebSocket proxy,
//! selects the ranges of the transcript to disclose, has the notary attest
//! to the transcript, builds a presentation and verifies it.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use disclosure::{Disclosure, NotarizeOptions, SessionOrchestrator};
//! use disclosure_engine::HttpRequest;
//! use disclosure_notary_client::NotaryReference;
//!
//! let options = NotarizeOptions::builder()
//!     .notary(NotaryReference::new("https://notary.example.com")?)
//!     .websocket_proxy_url("wss://proxy.example.com/?token=api.example.com")
//!     .request(HttpRequest {
//!         url: "https://api.example.com/widget".to_string(),
//!         ..Default::default()
//!     })
//!     .disclosure(Disclosure::request_headers(["host"]))
//!     .build()?;
//!
//! let result = SessionOrchestrator::default().notarize(&options).await?;
//! println!("{}", result.sent.to_redacted_string('X'));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod error;
mod options;
mod orchestrator;
mod presentation;
pub mod selector;
mod state;
mod verifier;

pub use disclosure_boundary::BoundaryErrorKind;
pub use error::{ErrorKind, NotarizationError};
pub use options::{NotarizeOptions, NotarizeOptionsBuilder, NotarizeOptionsBuilderError};
pub use orchestrator::{SessionOrchestrator, SessionOutput};
pub use presentation::PresentationBuilder;
pub use selector::{Disclosure, SelectionError, TranscriptSelector};
pub use state::{SessionObserver, SessionState};
pub use verifier::{Verifier, VerifyError};

//! `gridask-query`: natural-language questions in, [`Outcome`]s out.
//!
//! ```text
//! query ──► matcher (tier 1) ──hit──► Outcome::Resolved { tier: PatternMatched }
//!              │ miss
//!              ▼
//!           synth (tier 2) ──► sandbox ──► Outcome::Resolved { tier: AiResolved }
//!              │                  │
//!              └──── failures ────┴──────► Outcome::Failed { error_kind, .. }
//! ```

pub mod matcher;
pub mod outcome;
pub mod query;
pub mod resolver;
pub mod sandbox;
pub mod synth;

pub use matcher::{match_query, Match};
pub use outcome::{ErrorKind, Outcome, ResultData, Tier};
pub use query::Query;
pub use resolver::{Resolver, ResolverConfig};
pub use sandbox::{Sandbox, SandboxConfig, SandboxError};
pub use synth::{DatasetContext, OpenAiSynthesizer, Synthesis, SynthError, Synthesizer};

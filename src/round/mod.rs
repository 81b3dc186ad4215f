//! Round-based processing.
//!
//! - **context**: caches kept across the rounds of one compilation.
//! - **subcomponent**: worklist generation of contributed subcomponents.
//! - **scheduler**: per-round deferral decisions and target lifecycle.

pub mod context;
pub mod scheduler;
pub mod subcomponent;

pub use context::RoundContext;
pub use scheduler::{DeferralReason, GenerationRequest, RoundOutput, RoundScheduler, TargetState};
pub use subcomponent::{
    Expansion, FactoryDescriptor, ParentComponentDescriptor, SubcomponentExpander,
    SubcomponentRequest, Trigger,
};

//! # Cascade Resolver
//!
//! Narrowing of district → section → circuit → table identifiers, where every
//! field is looked up with the resolved ids of the fields before it.
//!
//! ## Flow
//!
//! ```text
//! user input / stored id
//!     │
//!     ├──> CascadeController
//!     │      ├─ normalize input, mark field Pending
//!     │      └─ issue LookupTicket (q + forwarded ancestor ids)
//!     │
//!     ├──> LookupClient ──> LookupService (HTTP, fixtures)
//!     │
//!     └──> CascadeController::apply
//!            ├─ drop stale tickets (newer lookup or form reset)
//!            ├─ 0 / 1 / N matches → NotFound / Resolved / Ambiguous
//!            ├─ reset descendants when the resolved id changed
//!            ├─ re-evaluate visibility gates
//!            └─ issue auto-fill tickets for empty neighbours
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use cascade_resolver::{CascadeChain, CascadeController, FieldName, FixtureLookupService, LookupClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LookupClient::from_service(FixtureLookupService::load("fixtures.json")?);
//!     let mut controller = CascadeController::new(CascadeChain::canonical());
//!
//!     let mesa = controller.input(FieldName::Mesa, "45", &client).await?;
//!     println!("{:?} -> {:?}", mesa.status, mesa.resolved_id);
//!     Ok(())
//! }
//! ```

mod autocomplete;
mod chain;
mod config;
mod controller;
mod error;
mod field;
mod fixture;
mod fuzzy;
mod lookup;
mod observer;
mod option_set;
mod resolver;
pub mod session;

pub use autocomplete::{AutocompleteAdapter, OptionSource, ValuesMap};
pub use chain::{CascadeChain, FieldSpec, Gate};
pub use config::{join_url, CascadeConfig, FieldConfig, PickerConfig};
pub use controller::{
    ApplyOutcome, CascadeController, CascadeSnapshot, ControllerOptions, FieldView, InputOutcome,
};
pub use error::{AutocompleteError, CascadeError, LookupError, Result};
pub use field::{FieldName, FieldState, FieldStatus};
pub use fixture::{FixtureEntry, FixtureFile, FixtureLookupService};
pub use fuzzy::DescriptionMatcher;
pub use lookup::{AutoFill, LookupClient, LookupPurpose, LookupResult, LookupService, LookupTicket};
pub use observer::{FieldObserver, FieldTransition, LogObserver, TransitionCause};
pub use option_set::OptionSet;
pub use resolver::{normalize_input, resolve, FieldResolver, NormalizedInput};
pub use session::{FormEvent, SessionHandle};

pub use cascade_protocol::{ForwardContext, ListedOption, LookupOption, LookupRequest, OptionId};

//! Domain model (ids, rows, tallies, outcomes, lifecycle state, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod row;
pub mod schema;
pub mod state;
pub mod tally;

pub use self::errors::{ErrorKind, SyncError};
pub use self::events::{ChatEvent, PollOption, PollSnapshot, SheetEvent};
pub use self::ids::{ChatId, MessageId, PollId};
pub use self::outcome::OutcomeCode;
pub use self::row::{PollRef, ProposalRow, SheetRow, is_true};
pub use self::schema::SchemaVersion;
pub use self::state::ProposalState;
pub use self::tally::{LabelTable, PollKind, TallyField, VoteTally};

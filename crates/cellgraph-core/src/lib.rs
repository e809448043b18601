//! cellgraph Core - reactive cells and their scheduler
//!
//! The runtime underneath recipe graphs:
//! - [`Cell`]: observable container addressed by [`Path`]s
//! - Reference resolution through aliases and cell references
//! - [`View`]: transparent read/write access that records dependencies
//! - [`ReactivityLog`]: reads and writes of one evaluation
//! - [`Scheduler`]: re-runs actions whose reads were invalidated
//!
//! # Example
//!
//! ```rust
//! use cellgraph_core::{Path, Scheduler, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new();
//! let cell = scheduler.cell(Value::from_iter([("input", 1)]));
//!
//! let c = cell.clone();
//! scheduler.add_action("copy", move |log| {
//!     let input = c.view(&Path::single("input"), Some(log))?.to_value()?;
//!     c.set_at_path(&Path::single("output"), input, Some(log))?;
//!     Ok(())
//! });
//!
//! scheduler.run_until_settled()?;
//! assert_eq!(cell.get_at_path(&Path::single("output")), 1.into());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cell;
pub mod config;
pub mod error;
pub mod log;
pub mod path;
pub mod resolve;
pub mod scheduler;
pub mod simple;
pub mod value;
pub mod view;

pub use cell::{Cell, CellId, CellReference, ChangeCallback, Subscription};
pub use config::RuntimeConfig;
pub use error::{ActionError, CellError, ResolveError, SchedulerError, ViewError};
pub use log::{path_affected, LogHandle, ReactivityLog};
pub use path::{Path, PathError, PathSegment};
pub use resolve::{follow, resolve_deep, Resolved};
pub use scheduler::{ActionFn, ActionId, EventHandler, HandlerId, Scheduler, SchedulerStats, WeakScheduler};
pub use simple::SimpleCell;
pub use value::{Alias, Map, Value, ALIAS_KEY, MAX_SEQUENCE_GROWTH, REFERENCE_KEY, STREAM_KEY};
pub use view::{write_through, StreamSender, View, ViewValue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with cellgraph Core
    pub use crate::{
        ActionError, Cell, CellReference, LogHandle, Path, Scheduler, Value, View, ViewValue,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Node handles and cluster view for the replicheck harness.
//!
//! The harness never talks to a concrete database. It depends on the narrow
//! capability set defined here:
//! - [`StoreConnector`] / [`StoreSession`]: connect, ping, insert with an
//!   acknowledgment level, read the id set, report the member's role
//! - [`NodeHandle`]: one owned connection with mandatory timeouts and
//!   last-observed reachability/role
//! - [`ClusterView`]: primary discovery by bounded polling
//!
//! Any store that can implement [`StoreConnector`] can be put under test.

pub mod driver;
pub mod error;
pub mod handle;
pub mod view;

pub use driver::{StoreConnector, StoreSession, Timeouts};
pub use error::{ConnectError, NoPrimaryError, ReadError};
pub use handle::NodeHandle;
pub use view::ClusterView;

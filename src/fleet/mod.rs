// Fleet integration module

pub mod connection;
pub mod control;
pub mod models;
pub mod parser;
pub mod poller;


pub use connection::HostConnection;
pub use control::UnitController;
pub use models::{ActiveState, HostSnapshot, UnitAction, UnitRecord};
pub use parser::parse_unit_records;
pub use poller::{spawn_poller, Fleet};

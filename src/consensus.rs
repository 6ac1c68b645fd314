// Validator bonding, jailing and proposer rotation. Records live in
// `validator`, the state machine in `registry`.

pub mod registry;
pub mod validator;

pub use registry::*;
pub use validator::*;

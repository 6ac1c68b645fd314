// core.rs splits block responsibilities into submodules: block types,
// the append-only chain, stateless checks and the assembler.
pub mod assembler;
pub mod chain;
pub mod state;
pub mod validation;

pub use assembler::*;
pub use chain::*;
pub use state::*;
pub use validation::*;

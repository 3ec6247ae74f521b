pub mod equilibrium;

pub use equilibrium::*;

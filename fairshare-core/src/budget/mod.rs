pub mod normalize;
pub mod virtual_median;

pub use normalize::*;
pub use virtual_median::*;

pub mod point;
pub mod quad;
pub mod rect;

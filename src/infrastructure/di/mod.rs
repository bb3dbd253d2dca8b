pub mod container;

pub use container::Toolkit;

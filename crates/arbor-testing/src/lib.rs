//! Testing utilities and harness for arbor engines

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}

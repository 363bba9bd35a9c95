mod other;

pub mod prelude {
    pub use super::other::OptionExt as _;
    pub use super::other::ResultExt as _;
}

pub use other::OtherError;
pub(crate) use other::{bail_other, ensure_other};

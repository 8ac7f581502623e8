use std::fmt;

/// Linkage of functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// The function is defined in the module, and can be called from the
    /// outside.
    Public,

    /// The function is defined in the module, and can NOT be called from the
    /// outside.
    Private,

    /// The function is defined outside of the module.
    External,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::External => write!(f, "external"),
        }
    }
}

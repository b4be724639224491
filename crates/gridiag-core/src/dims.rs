//! Dimension tags for gridded quantities.

use std::fmt;

/// A named dimension of a [`Quantity`](crate::Quantity).
///
/// Cell-centred and interface (staggered) variants are distinct tags:
/// an `x_interface` axis on a rank holds one more point than the
/// matching `x` axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Cell-centred x.
    X,
    /// Cell-interface x.
    XInterface,
    /// Cell-centred y.
    Y,
    /// Cell-interface y.
    YInterface,
    /// Cell-centred vertical level.
    Z,
    /// Vertical level interface.
    ZInterface,
    /// Any other dimension (tracer index, soil layer, ...).
    Other(String),
}

impl Dim {
    /// Canonical string tag of the dimension.
    pub fn as_str(&self) -> &str {
        match self {
            Self::X => "x",
            Self::XInterface => "x_interface",
            Self::Y => "y",
            Self::YInterface => "y_interface",
            Self::Z => "z",
            Self::ZInterface => "z_interface",
            Self::Other(name) => name,
        }
    }

    /// Parse a tag, mapping unknown names to [`Dim::Other`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "x" => Self::X,
            "x_interface" => Self::XInterface,
            "y" => Self::Y,
            "y_interface" => Self::YInterface,
            "z" => Self::Z,
            "z_interface" => Self::ZInterface,
            other => Self::Other(other.to_string()),
        }
    }

    /// True for both x variants.
    pub fn is_x(&self) -> bool {
        matches!(self, Self::X | Self::XInterface)
    }

    /// True for both y variants.
    pub fn is_y(&self) -> bool {
        matches!(self, Self::Y | Self::YInterface)
    }

    /// True for interface (staggered) axes.
    pub fn is_interface(&self) -> bool {
        matches!(self, Self::XInterface | Self::YInterface | Self::ZInterface)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

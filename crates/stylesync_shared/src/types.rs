//! Result types that are shared between all crates

/// Result that can be returned which holds either T or an Error
pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size<T: Copy> {
    pub width: T,
    pub height: T,
}

impl<T: Copy> Size<T> {
    pub fn new(width: T, height: T) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> &T {
        &self.width
    }

    pub fn height(&self) -> &T {
        &self.height
    }
}

impl Size<f32> {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    /// Returns true when the rendered width is zero (or negative, which some layouters report
    /// for fully collapsed boxes)
    pub fn has_zero_width(&self) -> bool {
        self.width <= 0.0
    }

    pub fn has_zero_height(&self) -> bool {
        self.height <= 0.0
    }
}

use fixed::types::I32F32;

/// CSS pixel length, fixed-point. Round-trips through integer millipixels so
/// repeated arithmetic stays deterministic across platforms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Px(I32F32);

impl Px {
    pub const ZERO: Px = Px(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Px {
        if !value.is_finite() {
            return Px::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Px::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Px {
        Px::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Px {
        let denom = 1i128 << 32;
        let milli = milli as i128;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Px(I32F32::from_bits(bits))
    }

    pub fn max(self, other: Px) -> Px {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Px) -> Px {
        if self <= other { self } else { other }
    }

    /// Floor division in millipixel space. How many `step`s fit into `self`.
    pub fn div_floor(self, step: Px) -> i64 {
        let step_milli = step.to_milli_i64();
        if step_milli <= 0 {
            return 0;
        }
        self.to_milli_i64().max(0) / step_milli
    }
}

impl std::ops::Add for Px {
    type Output = Px;
    fn add(self, rhs: Px) -> Px {
        Px::from_milli_i64(self.to_milli_i64().saturating_add(rhs.to_milli_i64()))
    }
}

impl std::ops::Sub for Px {
    type Output = Px;
    fn sub(self, rhs: Px) -> Px {
        Px::from_milli_i64(self.to_milli_i64().saturating_sub(rhs.to_milli_i64()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Px,
    pub height: Px,
}

impl Size {
    pub fn new(width: Px, height: Px) -> Self {
        Self { width, height }
    }

    pub fn from_f32(width: f32, height: f32) -> Self {
        Self {
            width: Px::from_f32(width),
            height: Px::from_f32(height),
        }
    }
}

/// Measurement verdict for a mirror tree inside its viewport box.
///
/// Transitions are driven by measurement only: appending content may move
/// Hungry -> Full, and rolling the appended content back moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    Hungry,
    Full,
}

//! # Per-frame motion vector reduction

use nalgebra as na;

/// Reference direction a motion vector was predicted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Reference {
    Forward,
    Backward,
}

impl Reference {
    /// Interpret the codec's `source` field.
    ///
    /// Only a zero source counts as the primary reference. Codecs usually report past
    /// references as negative values, so in practice most vectors end up `Backward`; the
    /// divergence values of existing feature sets depend on this mapping.
    pub fn from_source(source: i32) -> Self {
        if source == 0 {
            Self::Forward
        } else {
            Self::Backward
        }
    }

    fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

/// Single motion vector copied out of a frame's side data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionVector {
    /// Pixel displacement `(dx, dy)`.
    pub motion: na::Vector2<f64>,
    pub reference: Reference,
}

impl MotionVector {
    pub fn new(dx: i32, dy: i32, reference: Reference) -> Self {
        Self {
            motion: na::Vector2::new(dx as f64, dy as f64),
            reference,
        }
    }

    /// Squared magnitude, `dx² + dy²`.
    pub fn energy(&self) -> f64 {
        self.motion.norm_squared()
    }

    /// L1 magnitude, `|dx| + |dy|`.
    pub fn speed(&self) -> f64 {
        self.motion.lp_norm(1)
    }

    /// Speed signed by the reference direction.
    pub fn divergence(&self) -> f64 {
        self.reference.sign() * self.speed()
    }
}

/// How accumulated sums are turned into per-frame features.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Normalization {
    /// Divide every sum by the number of vectors.
    Average,
    /// Keep raw totals.
    Total,
}

impl From<bool> for Normalization {
    fn from(average: bool) -> Self {
        if average {
            Self::Average
        } else {
            Self::Total
        }
    }
}

/// Running sums over all motion vectors of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionStats {
    pub energy: f64,
    pub speed: f64,
    pub divergence: f64,
    pub count: usize,
}

impl MotionStats {
    pub fn add(&mut self, mv: &MotionVector) {
        self.energy += mv.energy();
        self.speed += mv.speed();
        self.divergence += mv.divergence();
        self.count += 1;
    }

    /// Produce the `(E, S, div)` triple.
    ///
    /// A frame without vectors always maps to zeroes, regardless of `mode`.
    pub fn finish(&self, mode: Normalization) -> (f64, f64, f64) {
        match (self.count, mode) {
            (0, _) => (0.0, 0.0, 0.0),
            (n, Normalization::Average) => {
                let n = n as f64;
                (self.energy / n, self.speed / n, self.divergence / n)
            }
            (_, Normalization::Total) => (self.energy, self.speed, self.divergence),
        }
    }
}

impl Extend<MotionVector> for MotionStats {
    fn extend<T: IntoIterator<Item = MotionVector>>(&mut self, iter: T) {
        iter.into_iter().for_each(|mv| self.add(&mv));
    }
}

impl FromIterator<MotionVector> for MotionStats {
    fn from_iter<T: IntoIterator<Item = MotionVector>>(iter: T) -> Self {
        let mut stats = Self::default();
        stats.extend(iter);
        stats
    }
}

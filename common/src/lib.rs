pub mod tracer;

use serde::{Deserialize, Serialize};

pub type EventId = u32;
pub type RunId = u32;

/// Voltage-like value of a single waveform sample.
pub type Sample = f64;
/// Time in nanoseconds.
pub type Time = f64;

/// The two read-out faces of the detector bar.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    #[strum(to_string = "front")]
    Front,
    #[strum(to_string = "back")]
    Back,
}

/// A value held once per detector side.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Sides<T> {
    pub front: T,
    pub back: T,
}

impl<T> Sides<T> {
    pub fn new(front: T, back: T) -> Self {
        Self { front, back }
    }

    /// Builds both sides by calling `f` once per side, front first.
    pub fn try_from_fn<E, F>(mut f: F) -> Result<Self, E>
    where
        F: FnMut(Side) -> Result<T, E>,
    {
        Ok(Self {
            front: f(Side::Front)?,
            back: f(Side::Back)?,
        })
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Front => &mut self.front,
            Side::Back => &mut self.back,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        [(Side::Front, &self.front), (Side::Back, &self.back)].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Side, &mut T)> {
        [(Side::Front, &mut self.front), (Side::Back, &mut self.back)].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_are_addressed_by_side() {
        let mut sides = Sides::new(1, 2);
        assert_eq!(*sides.get(Side::Front), 1);
        assert_eq!(*sides.get(Side::Back), 2);

        *sides.get_mut(Side::Back) += 10;
        assert_eq!(sides.back, 12);

        let order: Vec<_> = sides.iter().map(|(side, _)| side).collect();
        assert_eq!(order, vec![Side::Front, Side::Back]);
    }

    #[test]
    fn try_from_fn_stops_at_first_error() {
        let mut calls = 0;
        let result: Result<Sides<u8>, Side> = Sides::try_from_fn(|side| {
            calls += 1;
            match side {
                Side::Front => Err(side),
                Side::Back => Ok(0),
            }
        });
        assert_eq!(result, Err(Side::Front));
        assert_eq!(calls, 1);
    }

    #[test]
    fn side_display() {
        assert_eq!(Side::Front.to_string(), "front");
        assert_eq!(Side::Back.to_string(), "back");
    }
}

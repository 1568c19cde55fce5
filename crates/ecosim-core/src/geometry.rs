use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest effective step length; keeps rounding upstream from freezing movement.
pub const MIN_SPEED: f64 = 0.1;

/// Continuous position in world space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Construct a position from raw coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns true if both coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Point mirrored through `self` away from `threat`.
    #[must_use]
    pub fn away_from(&self, threat: &Position) -> Position {
        Position::new(2.0 * self.x - threat.x, 2.0 * self.y - threat.y)
    }

    /// Step at most `speed` units toward `target`, snapping onto it when close enough.
    pub fn move_towards(&mut self, target: &Position, speed: f64) {
        let speed = effective_speed(speed);
        let dist = self.distance(target);
        if dist <= speed {
            *self = *target;
            return;
        }
        let ratio = speed / dist;
        self.x += (target.x - self.x) * ratio;
        self.y += (target.y - self.y) * ratio;
    }

    /// Step `speed` units in a uniformly random direction.
    pub fn move_random<R: Rng + ?Sized>(&mut self, speed: f64, rng: &mut R) {
        let speed = effective_speed(speed);
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        self.x += angle.cos() * speed;
        self.y += angle.sin() * speed;
    }

    /// Tuple form consumed by the spatial index.
    #[must_use]
    pub const fn as_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

fn effective_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        MIN_SPEED
    } else {
        speed.max(MIN_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn move_towards_snaps_when_within_speed() {
        let mut pos = Position::new(0.0, 0.0);
        let target = Position::new(1.0, 1.0);
        pos.move_towards(&target, 5.0);
        assert_eq!(pos, target);
    }

    #[test]
    fn move_towards_advances_by_speed() {
        let mut pos = Position::new(0.0, 0.0);
        pos.move_towards(&Position::new(10.0, 0.0), 2.0);
        assert!((pos.x - 2.0).abs() < 1e-12);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn zero_speed_is_floored() {
        let mut pos = Position::new(0.0, 0.0);
        pos.move_towards(&Position::new(10.0, 0.0), 0.0);
        assert!((pos.x - MIN_SPEED).abs() < 1e-12);

        let mut rng = SmallRng::seed_from_u64(3);
        let mut wander = Position::new(50.0, 50.0);
        wander.move_random(-4.0, &mut rng);
        let step = wander.distance(&Position::new(50.0, 50.0));
        assert!((step - MIN_SPEED).abs() < 1e-9);
    }

    #[test]
    fn move_random_covers_requested_distance() {
        let mut rng = SmallRng::seed_from_u64(11);
        let origin = Position::new(100.0, 100.0);
        for _ in 0..32 {
            let mut pos = origin;
            pos.move_random(2.5, &mut rng);
            assert!((pos.distance(&origin) - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn away_from_mirrors_threat() {
        let me = Position::new(10.0, 10.0);
        let flee = me.away_from(&Position::new(7.0, 14.0));
        assert_eq!(flee, Position::new(13.0, 6.0));
    }
}

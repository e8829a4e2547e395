//! Landmarks and source/destination pairing.
//!
//! A landmark is a named (or unnamed) point in the landmarks frame of a
//! model. Warping needs each source landmark matched with the destination
//! landmark of the same name.

use std::collections::{HashMap, HashSet};

use nalgebra::Point3;

/// A single landmark read from a landmarks file.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    /// Optional name used to pair this landmark with its counterpart.
    pub name: Option<String>,
    /// Location of the landmark.
    pub position: Point3<f64>,
}

impl Landmark {
    /// Creates an unnamed landmark.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_landmarks::Landmark;
    /// use nalgebra::Point3;
    ///
    /// let landmark = Landmark::new(Point3::new(0.0, 0.1, 0.0));
    /// assert!(landmark.name.is_none());
    /// ```
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            name: None,
            position,
        }
    }

    /// Creates a named landmark.
    #[must_use]
    pub fn named(name: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            name: Some(name.into()),
            position,
        }
    }
}

/// A source/destination pairing attempt for one landmark name.
///
/// Either side may be missing; only complete pairs contribute to a warp.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPair {
    /// The landmark name (`unnamed_{i}` for unnamed landmarks).
    pub name: String,
    /// Location in the source landmarks, if present.
    pub source: Option<Point3<f64>>,
    /// Location in the destination landmarks, if present.
    pub destination: Option<Point3<f64>>,
}

impl LandmarkPair {
    /// Returns `true` when both sides are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    /// Returns the paired locations when both sides are present.
    #[must_use]
    pub fn paired_locations(&self) -> Option<PairedLandmark> {
        Some(PairedLandmark {
            name: self.name.clone(),
            source: self.source?,
            destination: self.destination?,
        })
    }
}

/// A landmark present on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedLandmark {
    /// The landmark name.
    pub name: String,
    /// Location in the source landmarks.
    pub source: Point3<f64>,
    /// Location in the destination landmarks.
    pub destination: Point3<f64>,
}

/// Gives every landmark a name; the i-th unnamed one becomes `unnamed_{i}`.
fn with_names(landmarks: &[Landmark]) -> Vec<(String, Point3<f64>)> {
    let mut unnamed = 0usize;
    landmarks
        .iter()
        .map(|landmark| {
            let name = landmark.name.clone().unwrap_or_else(|| {
                let name = format!("unnamed_{unnamed}");
                unnamed += 1;
                name
            });
            (name, landmark.position)
        })
        .collect()
}

/// Pairs source landmarks with destination landmarks by name.
///
/// Complete pairs are returned in source order. Every landmark that could
/// not be paired is passed to `on_unpaired`: source-only entries first (in
/// source order), then destination-only entries (in destination order).
/// When a name repeats on one side, the first occurrence is used and the
/// later ones are reported as unpaired.
///
/// # Example
///
/// ```
/// use mesh_landmarks::{pair_landmarks, Landmark};
/// use nalgebra::Point3;
///
/// let source = [Landmark::named("knee", Point3::origin())];
/// let destination = [
///     Landmark::named("knee", Point3::new(0.0, 0.0, 1.0)),
///     Landmark::named("hip", Point3::new(0.0, 1.0, 0.0)),
/// ];
///
/// let mut missing = Vec::new();
/// let pairs = pair_landmarks(&source, &destination, |pair| missing.push(pair.name.clone()));
///
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(missing, vec!["hip".to_string()]);
/// ```
pub fn pair_landmarks<F>(
    source: &[Landmark],
    destination: &[Landmark],
    mut on_unpaired: F,
) -> Vec<PairedLandmark>
where
    F: FnMut(&LandmarkPair),
{
    let source = with_names(source);
    let destination = with_names(destination);

    let mut first_destination: HashMap<&str, usize> = HashMap::new();
    for (index, (name, _)) in destination.iter().enumerate() {
        first_destination.entry(name.as_str()).or_insert(index);
    }

    let mut paired = Vec::new();
    let mut used_source: HashSet<&str> = HashSet::new();
    for (name, location) in &source {
        let matched = if used_source.insert(name.as_str()) {
            first_destination.get(name.as_str()).map(|&i| destination[i].1)
        } else {
            None
        };
        let pair = LandmarkPair {
            name: name.clone(),
            source: Some(*location),
            destination: matched,
        };
        match pair.paired_locations() {
            Some(complete) => paired.push(complete),
            None => on_unpaired(&pair),
        }
    }

    for (index, (name, location)) in destination.iter().enumerate() {
        let is_first = first_destination.get(name.as_str()) == Some(&index);
        if is_first && used_source.contains(name.as_str()) {
            continue;
        }
        on_unpaired(&LandmarkPair {
            name: name.clone(),
            source: None,
            destination: Some(*location),
        });
    }

    paired
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn p(x: f64) -> Point3<f64> {
        Point3::new(x, 0.0, 0.0)
    }

    #[test]
    fn pairs_by_name_in_source_order() {
        let source = [Landmark::named("b", p(1.0)), Landmark::named("a", p(2.0))];
        let destination = [Landmark::named("a", p(20.0)), Landmark::named("b", p(10.0))];

        let pairs = pair_landmarks(&source, &destination, |_| panic!("all landmarks pair"));

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].name, "b");
        assert_eq!(pairs[0].destination, p(10.0));
        assert_eq!(pairs[1].name, "a");
        assert_eq!(pairs[1].source, p(2.0));
    }

    #[test]
    fn unnamed_landmarks_pair_by_position() {
        let source = [Landmark::new(p(1.0)), Landmark::named("x", p(5.0)), Landmark::new(p(2.0))];
        let destination = [Landmark::new(p(3.0)), Landmark::new(p(4.0))];

        let mut unpaired = Vec::new();
        let pairs = pair_landmarks(&source, &destination, |pair| unpaired.push(pair.clone()));

        let names: Vec<_> = pairs.iter().map(|pair| pair.name.as_str()).collect();
        assert_eq!(names, ["unnamed_0", "unnamed_1"]);
        assert_eq!(pairs[1].destination, p(4.0));
        assert_eq!(unpaired.len(), 1);
        assert_eq!(unpaired[0].name, "x");
        assert!(!unpaired[0].is_complete());
    }

    #[test]
    fn unpaired_reported_source_side_first() {
        let source = [Landmark::named("only_src", p(0.0)), Landmark::named("both", p(1.0))];
        let destination = [Landmark::named("only_dst", p(2.0)), Landmark::named("both", p(3.0))];

        let mut unpaired = Vec::new();
        let pairs = pair_landmarks(&source, &destination, |pair| unpaired.push(pair.clone()));

        assert_eq!(pairs.len(), 1);
        assert_eq!(unpaired.len(), 2);
        assert_eq!(unpaired[0].name, "only_src");
        assert!(unpaired[0].destination.is_none());
        assert_eq!(unpaired[1].name, "only_dst");
        assert!(unpaired[1].source.is_none());
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let source = [Landmark::named("a", p(1.0)), Landmark::named("a", p(9.0))];
        let destination = [Landmark::named("a", p(2.0)), Landmark::named("a", p(8.0))];

        let mut unpaired = Vec::new();
        let pairs = pair_landmarks(&source, &destination, |pair| unpaired.push(pair.clone()));

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source, p(1.0));
        assert_eq!(pairs[0].destination, p(2.0));
        assert_eq!(unpaired.len(), 2);
        assert_eq!(unpaired[0].source, Some(p(9.0)));
        assert_eq!(unpaired[1].destination, Some(p(8.0)));
    }

    #[test]
    fn every_returned_pair_is_complete() {
        let source = [Landmark::named("a", p(1.0)), Landmark::new(p(2.0))];
        let destination = [Landmark::new(p(3.0))];

        let mut reported = 0;
        let pairs = pair_landmarks(&source, &destination, |pair| {
            assert!(!pair.is_complete());
            reported += 1;
        });

        assert_eq!(pairs.len(), 1);
        assert_eq!(reported, 1);
    }
}

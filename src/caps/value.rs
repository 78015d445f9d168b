//! The per-field value lattice (spec §9: "Implement as an ordered vector
//! of structures with a dedicated value lattice").

use std::cmp::{max, min};

/// One field's value. Ranges/lists/fractions are first-class so that
/// negotiation (§4.1) can intersect and fixate without special-casing.
#[derive(Debug, Clone, PartialEq)]
pub enum CapsValue {
    Bool(bool),
    Int(i64),
    IntRange(i64, i64),
    Float(f64),
    FloatRange(f64, f64),
    Fraction(i32, i32),
    Str(String),
    /// Unordered set of alternatives — any one of these satisfies the field.
    List(Vec<CapsValue>),
    /// Ordered tuple of values, all of which must hold simultaneously.
    Array(Vec<CapsValue>),
}

impl CapsValue {
    pub fn is_fixed(&self) -> bool {
        match self {
            CapsValue::Bool(_)
            | CapsValue::Int(_)
            | CapsValue::Float(_)
            | CapsValue::Fraction(_, _)
            | CapsValue::Str(_) => true,
            CapsValue::IntRange(_, _) | CapsValue::FloatRange(_, _) => false,
            CapsValue::List(items) => items.len() == 1 && items[0].is_fixed(),
            CapsValue::Array(items) => items.iter().all(CapsValue::is_fixed),
        }
    }

    /// Deterministic fixation: lowest integer in a range, first of a list,
    /// smallest denominator for fractions (spec §4.1).
    pub fn fixate(&self) -> CapsValue {
        match self {
            CapsValue::IntRange(lo, _hi) => CapsValue::Int(*lo),
            CapsValue::FloatRange(lo, _hi) => CapsValue::Float(*lo),
            CapsValue::List(items) => items
                .first()
                .map(CapsValue::fixate)
                .unwrap_or_else(|| self.clone()),
            CapsValue::Array(items) => CapsValue::Array(items.iter().map(CapsValue::fixate).collect()),
            other => other.clone(),
        }
    }

    /// Intersect two field values per the type lattice in spec §4.1:
    /// value∩value iff equal; value∩range iff in-range; range∩range is
    /// the smaller range or empty; a list is lifted to the union of its
    /// members' intersections.
    pub fn intersect(&self, other: &CapsValue) -> Option<CapsValue> {
        use CapsValue::*;
        match (self, other) {
            (List(items), _) => {
                let out: Vec<CapsValue> = items.iter().filter_map(|v| v.intersect(other)).collect();
                if out.is_empty() {
                    None
                } else if out.len() == 1 {
                    Some(out.into_iter().next().unwrap())
                } else {
                    Some(List(out))
                }
            }
            (_, List(_)) => other.intersect(self),
            (Array(a), Array(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                let mut out = Vec::with_capacity(a.len());
                for (x, y) in a.iter().zip(b.iter()) {
                    out.push(x.intersect(y)?);
                }
                Some(Array(out))
            }
            (Bool(a), Bool(b)) => (a == b).then(|| Bool(*a)),
            (Str(a), Str(b)) => (a == b).then(|| Str(a.clone())),
            (Fraction(an, ad), Fraction(bn, bd)) => (an == bn && ad == bd).then(|| Fraction(*an, *ad)),
            (Int(a), Int(b)) => (a == b).then(|| Int(*a)),
            (Int(a), IntRange(lo, hi)) | (IntRange(lo, hi), Int(a)) => {
                (*a >= *lo && *a <= *hi).then(|| Int(*a))
            }
            (IntRange(alo, ahi), IntRange(blo, bhi)) => {
                let lo = max(*alo, *blo);
                let hi = min(*ahi, *bhi);
                (lo <= hi).then(|| IntRange(lo, hi))
            }
            (Float(a), Float(b)) => (a == b).then(|| Float(*a)),
            (Float(a), FloatRange(lo, hi)) | (FloatRange(lo, hi), Float(a)) => {
                (*a >= *lo && *a <= *hi).then(|| Float(*a))
            }
            (FloatRange(alo, ahi), FloatRange(blo, bhi)) => {
                let lo = alo.max(*blo);
                let hi = ahi.min(*bhi);
                (lo <= hi).then(|| FloatRange(lo, hi))
            }
            _ => None,
        }
    }

    /// `self` is a subset of `other` — every value `self` admits, `other`
    /// also admits. Used by `is_always_compatible` (spec §4.1).
    pub fn is_subset_of(&self, other: &CapsValue) -> bool {
        match (self, other) {
            (CapsValue::List(items), _) => items.iter().all(|v| v.is_subset_of(other)),
            (_, CapsValue::List(items)) => items.iter().any(|v| self.is_subset_of(v)),
            (CapsValue::IntRange(alo, ahi), CapsValue::IntRange(blo, bhi)) => alo >= blo && ahi <= bhi,
            (CapsValue::Int(a), CapsValue::IntRange(lo, hi)) => a >= lo && a <= hi,
            (CapsValue::FloatRange(alo, ahi), CapsValue::FloatRange(blo, bhi)) => {
                alo >= blo && ahi <= bhi
            }
            (CapsValue::Float(a), CapsValue::FloatRange(lo, hi)) => a >= lo && a <= hi,
            (CapsValue::Array(a), CapsValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_subset_of(y))
            }
            _ => self == other,
        }
    }
}

impl From<i64> for CapsValue {
    fn from(v: i64) -> Self {
        CapsValue::Int(v)
    }
}

impl From<&str> for CapsValue {
    fn from(v: &str) -> Self {
        CapsValue::Str(v.to_string())
    }
}

impl From<bool> for CapsValue {
    fn from(v: bool) -> Self {
        CapsValue::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_intersect_narrows() {
        let a = CapsValue::IntRange(8000, 48000);
        let b = CapsValue::Int(44100);
        assert_eq!(a.intersect(&b), Some(CapsValue::Int(44100)));
    }

    #[test]
    fn disjoint_ranges_fail() {
        let a = CapsValue::IntRange(0, 10);
        let b = CapsValue::IntRange(20, 30);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn fixate_range_picks_lowest() {
        let a = CapsValue::IntRange(8000, 48000);
        assert_eq!(a.fixate(), CapsValue::Int(8000));
        assert!(a.fixate().is_fixed());
    }

    #[test]
    fn fixate_list_picks_first() {
        let a = CapsValue::List(vec![CapsValue::Int(2), CapsValue::Int(1)]);
        assert_eq!(a.fixate(), CapsValue::Int(2));
    }

    #[test]
    fn list_intersect_lifts_to_union() {
        let a = CapsValue::List(vec![CapsValue::Int(1), CapsValue::Int(2)]);
        let b = CapsValue::IntRange(2, 2);
        assert_eq!(a.intersect(&b), Some(CapsValue::Int(2)));
    }
}

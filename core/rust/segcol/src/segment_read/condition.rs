//! Predicates consulted while pruning with zone maps and bloom filters.

use crate::segment_read::index::bloom_filter::BloomFilter;
use segcol_core::datum::Datum;
use std::cmp::Ordering;

/// How a delete predicate relates to the rows summarised by a zone map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DelCondSatisfied {
    NotSatisfied,
    /// Every row matches, the whole page is deleted.
    Satisfied,
    PartSatisfied,
}

/// A predicate on a single column.
///
/// `min` and `max` come from a zone map. A null `min` means the range holds
/// nulls, a null `max` means it holds nothing but nulls.
pub trait ColumnCondition: Send + Sync {
    /// False only if no row in `[min, max]` can match.
    fn eval(&self, min: &Datum, max: &Datum) -> bool;

    fn del_eval(&self, min: &Datum, max: &Datum) -> DelCondSatisfied;

    fn can_use_bloom_filter(&self) -> bool {
        false
    }

    /// False only if the filter proves no row can match.
    fn eval_bloom(&self, _filter: &BloomFilter) -> bool {
        true
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    IsNull,
    IsNotNull,
}

/// `column <op> values`. `In` takes any number of values, the other
/// value operators use the first one.
#[derive(Debug, Clone)]
pub struct ComparisonCondition {
    op: CompareOp,
    values: Vec<Datum>,
}

impl ComparisonCondition {
    pub fn new(op: CompareOp, values: Vec<Datum>) -> Self {
        Self { op, values }
    }

    pub fn eq(value: Datum) -> Self {
        Self::new(CompareOp::Eq, vec![value])
    }

    pub fn is_null() -> Self {
        Self::new(CompareOp::IsNull, vec![])
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    fn operand(&self) -> Option<&Datum> {
        self.values.first()
    }
}

// Values of a different type than the bounds cannot be compared: keep the rows.
fn cmp(a: &Datum, b: &Datum) -> Option<Ordering> {
    a.partial_cmp(b)
}

fn may_contain(min: &Datum, max: &Datum, value: &Datum) -> bool {
    if value.is_null() {
        return false;
    }
    let above_min = min.is_null() || !matches!(cmp(value, min), Some(Ordering::Less));
    let below_max = !matches!(cmp(value, max), Some(Ordering::Greater));
    above_min && below_max
}

impl ColumnCondition for ComparisonCondition {
    fn eval(&self, min: &Datum, max: &Datum) -> bool {
        match self.op {
            CompareOp::IsNull => return min.is_null(),
            CompareOp::IsNotNull => return !max.is_null(),
            _ => {}
        }
        if max.is_null() {
            // all null, no value operator matches
            return false;
        }
        if self.op == CompareOp::In {
            return self.values.iter().any(|v| may_contain(min, max, v));
        }
        let Some(value) = self.operand() else {
            return true;
        };
        if value.is_null() {
            return false;
        }
        match self.op {
            CompareOp::Eq => may_contain(min, max, value),
            CompareOp::Ne => !(min == value && max == value),
            CompareOp::Lt => min.is_null() || !matches!(cmp(min, value), Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Le => min.is_null() || !matches!(cmp(min, value), Some(Ordering::Greater)),
            CompareOp::Gt => !matches!(cmp(max, value), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Ge => !matches!(cmp(max, value), Some(Ordering::Less)),
            CompareOp::In | CompareOp::IsNull | CompareOp::IsNotNull => true,
        }
    }

    fn del_eval(&self, min: &Datum, max: &Datum) -> DelCondSatisfied {
        let satisfied = |all: bool, some: bool| {
            if all {
                DelCondSatisfied::Satisfied
            } else if some {
                DelCondSatisfied::PartSatisfied
            } else {
                DelCondSatisfied::NotSatisfied
            }
        };
        match self.op {
            CompareOp::IsNull => return satisfied(max.is_null(), min.is_null()),
            CompareOp::IsNotNull => return satisfied(!min.is_null(), !max.is_null()),
            _ => {}
        }
        // Null rows never match a value operator.
        if min.is_null() || max.is_null() {
            return satisfied(false, self.eval(min, max));
        }
        let some = self.eval(min, max);
        let all = match (self.op, self.operand()) {
            (CompareOp::Eq, Some(v)) => min == v && max == v,
            (CompareOp::Ne, Some(v)) => {
                matches!(cmp(max, v), Some(Ordering::Less)) || matches!(cmp(min, v), Some(Ordering::Greater))
            }
            (CompareOp::Lt, Some(v)) => matches!(cmp(max, v), Some(Ordering::Less)),
            (CompareOp::Le, Some(v)) => matches!(cmp(max, v), Some(Ordering::Less | Ordering::Equal)),
            (CompareOp::Gt, Some(v)) => matches!(cmp(min, v), Some(Ordering::Greater)),
            (CompareOp::Ge, Some(v)) => matches!(cmp(min, v), Some(Ordering::Greater | Ordering::Equal)),
            (CompareOp::In, _) => min == max && self.values.contains(min),
            _ => false,
        };
        satisfied(all, some)
    }

    fn can_use_bloom_filter(&self) -> bool {
        matches!(self.op, CompareOp::Eq | CompareOp::In | CompareOp::IsNull)
    }

    fn eval_bloom(&self, filter: &BloomFilter) -> bool {
        match self.op {
            CompareOp::IsNull => filter.has_null(),
            CompareOp::Eq | CompareOp::In => self.values.iter().any(|v| filter.test_datum(v)),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(op: CompareOp, v: i32) -> ComparisonCondition {
        ComparisonCondition::new(op, vec![Datum::Int(v)])
    }

    #[test]
    fn test_eval_value_ops() {
        let (min, max) = (Datum::Int(10), Datum::Int(20));
        assert!(cond(CompareOp::Eq, 15).eval(&min, &max));
        assert!(!cond(CompareOp::Eq, 21).eval(&min, &max));
        assert!(!cond(CompareOp::Lt, 10).eval(&min, &max));
        assert!(cond(CompareOp::Le, 10).eval(&min, &max));
        assert!(!cond(CompareOp::Gt, 20).eval(&min, &max));
        assert!(cond(CompareOp::Ge, 20).eval(&min, &max));
        assert!(cond(CompareOp::Ne, 10).eval(&min, &max));
        assert!(!cond(CompareOp::Ne, 7).eval(&Datum::Int(7), &Datum::Int(7)));

        let in_list = ComparisonCondition::new(CompareOp::In, vec![Datum::Int(1), Datum::Int(12)]);
        assert!(in_list.eval(&min, &max));
    }

    #[test]
    fn test_eval_with_nulls() {
        let all_null = (Datum::Null, Datum::Null);
        assert!(ComparisonCondition::is_null().eval(&all_null.0, &all_null.1));
        assert!(!cond(CompareOp::Eq, 1).eval(&all_null.0, &all_null.1));
        assert!(!ComparisonCondition::new(CompareOp::IsNotNull, vec![]).eval(&all_null.0, &all_null.1));

        let some_null = (Datum::Null, Datum::Int(5));
        assert!(cond(CompareOp::Lt, -100).eval(&some_null.0, &some_null.1));
        assert!(!ComparisonCondition::is_null().eval(&Datum::Int(1), &Datum::Int(5)));
    }

    #[test]
    fn test_del_eval() {
        let (min, max) = (Datum::Int(10), Datum::Int(20));
        assert_eq!(cond(CompareOp::Lt, 30).del_eval(&min, &max), DelCondSatisfied::Satisfied);
        assert_eq!(cond(CompareOp::Lt, 15).del_eval(&min, &max), DelCondSatisfied::PartSatisfied);
        assert_eq!(cond(CompareOp::Lt, 5).del_eval(&min, &max), DelCondSatisfied::NotSatisfied);
        assert_eq!(cond(CompareOp::Lt, 30).del_eval(&Datum::Null, &max), DelCondSatisfied::PartSatisfied);
        assert_eq!(
            ComparisonCondition::is_null().del_eval(&Datum::Null, &Datum::Null),
            DelCondSatisfied::Satisfied
        );
    }

    #[test]
    fn test_mismatched_types_are_kept() {
        let cond = ComparisonCondition::eq(Datum::Bytes(b"x".to_vec()));
        assert!(cond.eval(&Datum::Int(1), &Datum::Int(2)));
    }
}

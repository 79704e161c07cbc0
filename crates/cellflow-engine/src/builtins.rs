//! Built-in aggregate functions.
//!
//! Conventions:
//! - Spreadsheet-facing names are ALL CAPS (e.g. `SUM`, `AVERAGE`).
//! - Every built-in folds a flattened list of numbers; argument resolution
//!   (ranges, cells, literals) happens in the evaluator before the call.
//! - If you add a new built-in, add it to `BUILTINS`.

pub struct Builtin {
    pub name: &'static str,
    pub apply: fn(&[f64]) -> f64,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "SUM",
        apply: sum,
    },
    Builtin {
        name: "AVERAGE",
        apply: average,
    },
    Builtin {
        name: "MIN",
        apply: min,
    },
    Builtin {
        name: "MAX",
        apply: max,
    },
    Builtin {
        name: "COUNT",
        apply: count,
    },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name.eq_ignore_ascii_case(name))
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

// Empty input is NaN, which the evaluator reports as #NUM!.
fn average(values: &[f64]) -> f64 {
    sum(values) / values.len() as f64
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn count(values: &[f64]) -> f64 {
    values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, values: &[f64]) -> f64 {
        (lookup(name).unwrap().apply)(values)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("sum").map(|b| b.name), Some("SUM"));
        assert!(lookup("NOPE").is_none());
    }

    #[test]
    fn test_aggregates_over_range_values() {
        let values = [10.0, 20.0, 30.0];
        assert_eq!(call("SUM", &values), 60.0);
        assert_eq!(call("AVERAGE", &values), 20.0);
        assert_eq!(call("MIN", &values), 10.0);
        assert_eq!(call("MAX", &values), 30.0);
        assert_eq!(call("COUNT", &values), 3.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(call("SUM", &[]), 0.0);
        assert_eq!(call("COUNT", &[]), 0.0);
        assert!(call("AVERAGE", &[]).is_nan());
        assert!(call("MIN", &[]).is_infinite());
        assert!(call("MAX", &[]).is_infinite());
    }
}

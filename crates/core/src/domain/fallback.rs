use serde::Serialize;

/// A value picked from an ordered list of candidate sources, together with
/// the source that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T, S> {
    pub value: T,
    pub source: S,
}

impl<T, S> Resolved<T, S> {
    pub fn new(value: T, source: S) -> Self {
        Self { value, source }
    }
}

/// Returns the first candidate that carries a value, or the terminal default.
///
/// Candidates are consumed in order and lazily, so a `map` over an iterator
/// only evaluates sources up to the first hit.
pub fn first_available<T, S, I>(candidates: I, default_source: S, default: T) -> Resolved<T, S>
where
    I: IntoIterator<Item = (S, Option<T>)>,
{
    candidates
        .into_iter()
        .find_map(|(source, value)| value.map(|value| Resolved { value, source }))
        .unwrap_or(Resolved {
            value: default,
            source: default_source,
        })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::first_available;

    #[test]
    fn picks_first_candidate_with_value() {
        let resolved = first_available(
            [("a", None), ("b", Some(2)), ("c", Some(3))],
            "default",
            0,
        );
        assert_eq!(resolved.value, 2);
        assert_eq!(resolved.source, "b");
    }

    #[test]
    fn falls_back_to_terminal_default() {
        let resolved = first_available([("a", None::<i32>)], "default", -1);
        assert_eq!(resolved.value, -1);
        assert_eq!(resolved.source, "default");
    }

    #[test]
    fn stops_evaluating_after_first_hit() {
        let evaluated = Cell::new(0);
        let candidates = [1, 2, 3].into_iter().map(|n| {
            evaluated.set(evaluated.get() + 1);
            (n, if n >= 2 { Some(n * 10) } else { None })
        });
        let resolved = first_available(candidates, 0, 0);
        assert_eq!(resolved.value, 20);
        assert_eq!(evaluated.get(), 2);
    }
}

use crate::dtype::DType;
use crate::specialization::Specialization;
use std::sync::Arc;

/// Finds the registered loop that `requested` input types can be safely cast
/// to.
///
/// Among all candidates accepting every requested type under safe casting,
/// the one with the lexicographically smallest input types (NumPy type order,
/// first input most significant) wins. Equal keys keep the earlier
/// registration.
pub(crate) fn find_matching_loop<'a, I>(requested: &[DType], candidates: I) -> Option<&'a Arc<Specialization>>
where
    I: IntoIterator<Item = &'a Arc<Specialization>>,
{
    let mut best: Option<(&'a Arc<Specialization>, Vec<usize>)> = None;
    for spec in candidates {
        let stored = spec.args();
        if stored.len() != requested.len()
            || !requested.iter().zip(stored).all(|(r, s)| r.can_cast_safe(*s))
        {
            continue;
        }
        let key: Vec<usize> = stored.iter().map(|t| t.type_order()).collect();
        match &best {
            Some((_, best_key)) if *best_key <= key => {}
            _ => best = Some((spec, key)),
        }
    }
    best.map(|(spec, _)| spec)
}

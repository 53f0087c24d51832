//! Final argument vector for the container command.

use std::collections::BTreeMap;

use crate::annotation::AnnotatedArgument;

/// Replace every argument with a planned rewrite; all others are copied as
/// parsed (inline prefixes already stripped).
pub fn rewrite_arguments(
    args: &[AnnotatedArgument],
    rewrites: &BTreeMap<usize, String>,
) -> Vec<String> {
    args.iter()
        .map(|arg| {
            rewrites
                .get(&arg.index)
                .cloned()
                .unwrap_or_else(|| arg.text.clone())
        })
        .collect()
}

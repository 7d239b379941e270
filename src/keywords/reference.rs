//! `$ref`, `$dynamicRef` and `$recursiveRef`.
//!
//! A reference that cannot be resolved does not abort evaluation: the
//! keyword fails with the resolution error as its message.

use crate::error::ResolveError;
use crate::evaluator::KeywordContext;
use crate::registry::ResolvedSchema;

use super::describe;

pub(super) fn reference(ctx: &mut KeywordContext<'_, '_>) {
    let Some(reference) = ctx.data().as_str() else {
        return;
    };
    let target = ctx.registry().resolve_ref(ctx.base_uri(), reference);
    follow(ctx, reference, target);
}

pub(super) fn dynamic_reference(ctx: &mut KeywordContext<'_, '_>) {
    let Some(reference) = ctx.data().as_str() else {
        return;
    };
    let target = ctx
        .registry()
        .resolve_dynamic_ref(ctx.base_uri(), ctx.scope(), reference);
    follow(ctx, reference, target);
}

pub(super) fn recursive_reference(ctx: &mut KeywordContext<'_, '_>) {
    let Some(reference) = ctx.data().as_str() else {
        return;
    };
    let target = ctx
        .registry()
        .resolve_recursive_ref(ctx.base_uri(), ctx.scope(), reference);
    follow(ctx, reference, target);
}

fn follow(
    ctx: &mut KeywordContext<'_, '_>,
    reference: &str,
    target: Result<ResolvedSchema<'_>, ResolveError>,
) {
    match target {
        Ok(target) => {
            tracing::trace!(reference, target = %target.base, "following reference");
            let instance = ctx.instance();
            let valid = ctx.descend_resolved(target);
            ctx.conclude(valid, || {
                format!("{} does not match {}", describe(instance), reference)
            });
        }
        Err(err) => {
            tracing::debug!(reference, error = %err, "unresolved reference");
            ctx.fail(err.to_string());
        }
    }
}

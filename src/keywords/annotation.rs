//! `format`, and the keywords that only annotate.

use serde_json::Value;

use crate::evaluator::KeywordContext;
use crate::types::Vocabulary;

use super::describe;

/// Annotates the format name. Asserts only when asked to, either through
/// the options or an active format-assertion vocabulary; an unknown format
/// then fails.
pub(super) fn format(ctx: &mut KeywordContext<'_, '_>) {
    let Some(name) = ctx.data().as_str() else {
        return;
    };
    ctx.annotate(Value::from(name));

    let asserting = ctx.options().require_format_validation
        || ctx
            .dialect()
            .vocabularies
            .contains(Vocabulary::FormatAssertion);
    if !asserting {
        return;
    }

    let instance = ctx.instance();
    match ctx.formats().get(name) {
        Some(validator) => match validator.check(instance) {
            Ok(()) => ctx.pass(),
            Err(reason) => ctx.fail(format!(
                "{} is not a valid \"{}\": {}",
                describe(instance),
                name,
                reason
            )),
        },
        None => ctx.fail(format!("unknown format \"{}\"", name)),
    }
}

pub(super) fn annotate(ctx: &mut KeywordContext<'_, '_>) {
    let value = ctx.data().clone();
    ctx.annotate(value);
}

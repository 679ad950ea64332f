use std::time::Instant;

#[cfg(feature = "profiling")]
use crate::telemetry::events::{ProfileEvent, TelemetryEvent, emit_global};
#[cfg(feature = "profiling")]
use crate::telemetry::tags;
#[cfg(feature = "profiling")]
use std::collections::BTreeSet;
#[cfg(feature = "profiling")]
use std::sync::{OnceLock, RwLock};

/// Converts elapsed time since `started_at` to microseconds, clamped to `u64::MAX`.
#[inline]
pub fn elapsed_us(started_at: Instant) -> u64 {
    started_at.elapsed().as_micros().min(u64::MAX as u128) as u64
}

#[cfg(feature = "profiling")]
const PROFILE_TAGS_ENV: &str = "WRITEBACK_PROFILE_TAGS";

#[cfg(feature = "profiling")]
#[derive(Debug, Clone, Default)]
struct TagFilter {
    // None => all tags enabled.
    enabled: Option<BTreeSet<String>>,
}

#[cfg(feature = "profiling")]
fn normalize_tags<'a>(raw: impl IntoIterator<Item = &'a str>) -> Option<BTreeSet<String>> {
    let mut tags = BTreeSet::new();
    for token in raw.into_iter().map(str::trim).filter(|token| !token.is_empty()) {
        let normalized = token.to_ascii_lowercase();
        if normalized == "*" || normalized == "all" {
            return None;
        }
        tags.insert(normalized);
    }

    if tags.is_empty() { None } else { Some(tags) }
}

#[cfg(feature = "profiling")]
fn filter_state() -> &'static RwLock<TagFilter> {
    static STATE: OnceLock<RwLock<TagFilter>> = OnceLock::new();
    STATE.get_or_init(|| {
        let enabled = std::env::var(PROFILE_TAGS_ENV)
            .ok()
            .and_then(|raw| normalize_tags(raw.split(',')));
        RwLock::new(TagFilter { enabled })
    })
}

/// Sets the enabled profiling tags; an empty slice, `*` or `all` enables everything.
#[cfg(feature = "profiling")]
pub fn set_enabled_tags(tags: &[&str]) {
    let enabled = normalize_tags(tags.iter().copied());
    match filter_state().write() {
        Ok(mut guard) => guard.enabled = enabled,
        Err(poisoned) => poisoned.into_inner().enabled = enabled,
    }
}

#[cfg(not(feature = "profiling"))]
pub fn set_enabled_tags(_tags: &[&str]) {}

/// Returns true when at least one tag in the stack is enabled.
#[cfg(feature = "profiling")]
pub fn is_tag_stack_enabled(tag_stack: &[&str]) -> bool {
    let state = match filter_state().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match &state.enabled {
        None => true,
        Some(enabled) => tag_stack
            .iter()
            .any(|tag| enabled.contains(&tag.to_ascii_lowercase())),
    }
}

#[cfg(not(feature = "profiling"))]
pub fn is_tag_stack_enabled(_tag_stack: &[&str]) -> bool {
    false
}

#[cfg(feature = "profiling")]
#[inline]
pub fn event(
    target: &'static str,
    tag_stack: &[&str],
    op: &'static str,
    result: &'static str,
    elapsed_us: u64,
    message: &'static str,
) {
    if !is_tag_stack_enabled(tag_stack) {
        return;
    }

    emit_global(TelemetryEvent::Profile(ProfileEvent {
        target,
        op,
        result,
        elapsed_us,
        tags: tag_stack.iter().map(|tag| (*tag).to_string()).collect(),
        message,
    }));

    match target {
        tags::PROFILE_BUFFER => {
            tracing::debug!(target: tags::PROFILE_BUFFER, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_QUEUE => {
            tracing::debug!(target: tags::PROFILE_QUEUE, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_WORKER => {
            tracing::debug!(target: tags::PROFILE_WORKER, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_PIPELINE => {
            tracing::debug!(target: tags::PROFILE_PIPELINE, op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        _ => {
            tracing::debug!(target: "writeback.profile", op, result, elapsed_us, original_target = target, tags = ?tag_stack, "{message}");
        }
    }
}

#[cfg(not(feature = "profiling"))]
#[inline]
pub fn event(
    _target: &'static str,
    _tag_stack: &[&str],
    _op: &'static str,
    _result: &'static str,
    _elapsed_us: u64,
    _message: &'static str,
) {
}

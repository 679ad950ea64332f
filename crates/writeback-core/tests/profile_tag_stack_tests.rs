use std::time::{Duration, Instant};

use writeback_core::telemetry::profile;

#[test]
fn elapsed_us_reports_elapsed_time() {
    let started_at = Instant::now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(profile::elapsed_us(started_at) >= 1_000);
}

#[cfg(feature = "profiling")]
mod profile_tag_stack_tests {
    use std::sync::Mutex;

    use writeback_core::telemetry::profile;
    use writeback_core::telemetry::tags;

    static PROFILE_TAG_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn supports_enabling_multiple_tags_together() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_QUEUE, tags::TAG_BUFFER]);

        assert!(profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_QUEUE
        ]));
        assert!(profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_BUFFER
        ]));
        assert!(!profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_WORKER
        ]));

        profile::set_enabled_tags(&[]);
    }

    #[test]
    fn system_tag_can_enable_shared_events() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_SYSTEM]);

        assert!(profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_PIPELINE
        ]));
        assert!(profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_WORKER
        ]));

        profile::set_enabled_tags(&[]);
    }

    #[test]
    fn wildcard_and_empty_enable_everything() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_BUFFER]);
        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_PIPELINE]));

        profile::set_enabled_tags(&["ALL"]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_PIPELINE]));

        profile::set_enabled_tags(&[tags::TAG_BUFFER]);
        profile::set_enabled_tags(&[" ", ""]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_QUEUE]));
    }
}

#[cfg(not(feature = "profiling"))]
mod profile_tag_stack_disabled_tests {
    use writeback_core::telemetry::profile;
    use writeback_core::telemetry::tags;

    #[test]
    fn profile_api_is_noop_and_tags_remain_disabled() {
        profile::set_enabled_tags(&[tags::TAG_QUEUE, tags::TAG_BUFFER]);

        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM]));
        assert!(!profile::is_tag_stack_enabled(&[
            tags::TAG_SYSTEM,
            tags::TAG_BUFFER
        ]));

        profile::event(
            tags::PROFILE_QUEUE,
            &[tags::TAG_SYSTEM, tags::TAG_QUEUE],
            "noop",
            "ok",
            1,
            "profiling disabled",
        );
    }
}

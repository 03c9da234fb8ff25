#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;

use ironsieve_core::config::FilterSpec;
use ironsieve_core::event::Event;
use ironsieve_filter::{FilterChain, FilterFactory};

fn chain() -> &'static FilterChain {
    static CHAIN: OnceLock<FilterChain> = OnceLock::new();
    CHAIN.get_or_init(|| {
        let chain = FilterChain::default();
        let specs = [
            FilterSpec::new("min-level", "level").with_setting("min_level", "debug"),
            FilterSpec::new("sources", "source")
                .with_setting("mode", "blacklist")
                .with_setting("sources", vec!["Noisy"])
                .with_setting("hierarchical", true),
            FilterSpec::new("redact", "content")
                .with_setting("mode", "redact")
                .with_setting("patterns", vec!["secret"]),
            FilterSpec::new("correlation", "correlation"),
        ];
        let _ = FilterFactory::new().populate(&chain, &specs);
        chain
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(event) = serde_json::from_str::<Event>(json) {
            let outcome = chain().evaluate(&event, event.correlation_id());
            let _ = serde_json::to_string(&outcome);
        }
    }
});

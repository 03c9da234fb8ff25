#![no_main]

use libfuzzer_sys::fuzz_target;

use ironsieve_core::settings::Settings;
use ironsieve_filter::FilterFactory;

const KEYS: &[&str] = &[
    "min_level",
    "rate",
    "max_events",
    "window_secs",
    "patterns",
    "mode",
    "case_sensitive",
];

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let Ok(settings) = serde_json::from_str::<Settings>(json) else {
            return;
        };

        // 어떤 값이 와도 강제 변환은 Ok 또는 TypeMismatch여야 함
        for key in KEYS {
            let _ = settings.bool(key);
            let _ = settings.int(key);
            let _ = settings.float(key);
            let _ = settings.string(key);
            let _ = settings.string_list(key);
            let _ = settings.non_negative(key);
            let _ = settings.duration_secs(key);
        }

        // 모든 필터 종류가 임의 설정을 에러로 거부할 뿐 패닉하지 않아야 함
        let factory = FilterFactory::new();
        for kind in factory.kinds() {
            let _ = factory.create(kind, "fuzz", &settings);
        }
    }
});

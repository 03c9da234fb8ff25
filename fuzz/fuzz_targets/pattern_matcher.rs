#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ironsieve_filter::{MatchMode, PatternMatcher};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    text: String,
    pattern: String,
    replacement: String,
    case_sensitive: bool,
    mode: FuzzMode,
}

#[derive(Arbitrary, Debug)]
enum FuzzMode {
    Literal,
    Wildcard,
    Regex,
    Hierarchical,
}

impl FuzzMode {
    fn to_match_mode(&self) -> MatchMode {
        match self {
            FuzzMode::Literal => MatchMode::Literal,
            FuzzMode::Wildcard => MatchMode::Wildcard,
            FuzzMode::Regex => MatchMode::Regex,
            FuzzMode::Hierarchical => MatchMode::Hierarchical,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    // 패턴 길이 제한 (정규식 컴파일 비용)
    if input.pattern.len() > 256 {
        return;
    }
    let mode = input.mode.to_match_mode();
    let matcher = PatternMatcher::new();

    // 잘못된 정규식도 패닉 없이 false 또는 리터럴 매칭이어야 함
    let _ = PatternMatcher::check(&input.pattern, mode);
    let matched = matcher.matches(&input.text, &input.pattern, input.case_sensitive, mode);

    // 캐시 적중 경로도 같은 결과를 내야 함
    assert_eq!(
        matched,
        matcher.matches(&input.text, &input.pattern, input.case_sensitive, mode)
    );

    let _ = matcher.contains(&input.text, &input.pattern, input.case_sensitive);
    let _ = matcher.replace_all(
        &input.text,
        &input.pattern,
        input.case_sensitive,
        mode,
        &input.replacement,
    );
});

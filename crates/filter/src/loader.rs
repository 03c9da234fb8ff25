//! 필터 정의 로더 -- YAML 필터 정의 파일을 디스크에서 로드합니다.
//!
//! 필터 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 파일 하나에는 필터 정의 하나 또는 정의 목록이 들어갈 수 있습니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.
//!
//! ```yaml
//! name: noisy-sources
//! kind: source
//! priority: 150
//! settings:
//!   mode: blacklist
//!   patterns: ["Telemetry.*", "Heartbeat*"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use ironsieve_core::config::FilterSpec;

use crate::error::FilterError;

const MAX_FILTER_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_FILTERS_COUNT: usize = 10_000;

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterDocument {
    Many(Vec<FilterSpec>),
    One(FilterSpec),
}

/// 필터 정의 로더
pub struct FilterLoader;

impl FilterLoader {
    /// 디렉토리에서 모든 YAML 필터 정의를 로드합니다.
    ///
    /// 파일 이름 순으로 처리하며, 이미 로드된 이름의 정의는 경고 후 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 정의 수가 `MAX_FILTERS_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<FilterSpec>, FilterError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| FilterError::Load {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| FilterError::Load {
            path: dir.display().to_string(),
            reason: format!("failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut specs = Vec::new();
        let mut seen_names = HashSet::new();

        for path in paths {
            let loaded = match Self::load_file(&path).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load filter file, skipping"
                    );
                    continue;
                }
            };

            for spec in loaded {
                if !seen_names.insert(spec.name.clone()) {
                    tracing::warn!(
                        filter = %spec.name,
                        path = %path.display(),
                        "duplicate filter name, skipping"
                    );
                    continue;
                }
                specs.push(spec);
            }

            if specs.len() > MAX_FILTERS_COUNT {
                return Err(FilterError::Load {
                    path: dir.display().to_string(),
                    reason: format!("too many filters: max {MAX_FILTERS_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = specs.len(),
            "loaded filter definitions"
        );

        Ok(specs)
    }

    /// 단일 YAML 파일에서 필터 정의를 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<FilterSpec>, FilterError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| FilterError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_FILTER_FILE_SIZE {
            return Err(FilterError::Load {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_FILTER_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FilterError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 필터 정의를 생성합니다.
    ///
    /// 이름/종류의 구조적 조건만 검사하며, 설정 값은 필터 생성 시 검증됩니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<FilterSpec>, FilterError> {
        let document: FilterDocument =
            serde_yaml::from_str(yaml_str).map_err(|e| FilterError::Load {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        let specs = match document {
            FilterDocument::Many(specs) => specs,
            FilterDocument::One(spec) => vec![spec],
        };

        for (index, spec) in specs.iter().enumerate() {
            spec.validate_shape(&format!("filters[{index}]"))
                .map_err(|e| FilterError::Load {
                    path: source.to_owned(),
                    reason: e.to_string(),
                })?;
        }

        Ok(specs)
    }
}

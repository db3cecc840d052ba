//! Adaptive compressor: a bounded quality-reduction search against a byte budget.
//!
//! Given one image and one [`OptimizationRequest`], encode it, and while the
//! output is over budget lower the quality by a fixed step and encode again.
//! The search stops at the first of:
//!
//! | State | Condition |
//! |---|---|
//! | [`SearchState::Converged`] | output size ≤ `max_size_bytes` |
//! | [`SearchState::QualityFloor`] | quality ≤ `min_quality` |
//! | [`SearchState::AttemptsExhausted`] | `max_attempts` encodes performed |
//!
//! All three are successes. Running out of quality or attempts returns the
//! last encode rather than an error: an oversized image is degraded delivery,
//! a failed pipeline is an outage.
//!
//! With the default policy the schedule from quality 85 is `85 → 70 → 60`,
//! so at most three encodes happen; a starting quality of 100 gives
//! `100 → 85 → 70 → 60` and hits both limits at once.
//!
//! The latest encode always replaces the previous candidate, even if it is
//! larger. Decode and encode errors are returned unchanged on the first
//! occurrence; lowering the quality cannot repair a corrupt input.

use crate::config::CompressionConfig;
use crate::imaging::{
    BackendError, ImageBackend, OptimizationRequest, OptimizationResult, Quality,
};
use tracing::debug;

pub const DEFAULT_QUALITY: Quality = Quality(85);
pub const MAX_SIZE_BYTES: usize = 800 * 1024;
pub const MIN_QUALITY: Quality = Quality(60);
pub const MAX_ATTEMPTS: u32 = 4;
pub const QUALITY_STEP: u32 = 15;

/// Termination policy for the quality search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub max_size_bytes: usize,
    pub min_quality: Quality,
    pub max_attempts: u32,
    pub quality_step: u32,
}

impl CompressionPolicy {
    /// Build a policy from the `[compression]` config section.
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            min_quality: Quality::new(config.min_quality),
            max_attempts: config.max_attempts,
            quality_step: config.quality_step,
        }
    }

    /// Decide whether the search continues after an encode.
    ///
    /// `attempts` counts encodes performed so far, including this one.
    pub fn next_state(&self, size: usize, quality: Quality, attempts: u32) -> SearchState {
        if size <= self.max_size_bytes {
            SearchState::Converged
        } else if quality <= self.min_quality {
            SearchState::QualityFloor
        } else if attempts >= self.max_attempts {
            SearchState::AttemptsExhausted
        } else {
            SearchState::Searching
        }
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: MAX_SIZE_BYTES,
            min_quality: MIN_QUALITY,
            max_attempts: MAX_ATTEMPTS,
            quality_step: QUALITY_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Searching,
    Converged,
    QualityFloor,
    AttemptsExhausted,
}

impl SearchState {
    pub fn is_terminal(self) -> bool {
        self != SearchState::Searching
    }
}

/// Final candidate of a search, with how the search ended.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub result: OptimizationResult,
    pub state: SearchState,
    /// Number of encodes performed.
    pub attempts: u32,
}

/// Run the quality search for one request.
///
/// Starts at `request.quality` and never performs more than
/// `policy.max_attempts` encodes.
pub fn compress(
    backend: &impl ImageBackend,
    input: &[u8],
    request: &OptimizationRequest,
    policy: &CompressionPolicy,
) -> Result<Compressed, BackendError> {
    let mut quality = request.quality;
    let mut attempts = 0;

    loop {
        let attempt = OptimizationRequest {
            quality,
            ..*request
        };
        let result = backend.encode(input, &attempt)?;
        attempts += 1;

        let state = policy.next_state(result.optimized_size(), quality, attempts);
        debug!(
            format = %request.format,
            quality = quality.value(),
            size = result.optimized_size(),
            attempts,
            ?state,
            "compression attempt"
        );

        if state.is_terminal() {
            return Ok(Compressed {
                result,
                state,
                attempts,
            });
        }
        quality = quality.step_down(policy.quality_step, policy.min_quality);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::OutputFormat;
    use crate::imaging::backend::tests::MockBackend;

    const KB: usize = 1024;

    fn jpeg_request() -> OptimizationRequest {
        OptimizationRequest::new(OutputFormat::Jpeg)
    }

    // =========================================================================
    // next_state tests
    // =========================================================================

    #[test]
    fn next_state_converged_wins_over_floor() {
        let policy = CompressionPolicy::default();
        assert_eq!(
            policy.next_state(100, MIN_QUALITY, MAX_ATTEMPTS),
            SearchState::Converged
        );
    }

    #[test]
    fn next_state_exact_budget_is_converged() {
        let policy = CompressionPolicy::default();
        assert_eq!(
            policy.next_state(MAX_SIZE_BYTES, Quality::new(85), 1),
            SearchState::Converged
        );
        assert_eq!(
            policy.next_state(MAX_SIZE_BYTES + 1, Quality::new(85), 1),
            SearchState::Searching
        );
    }

    #[test]
    fn next_state_floor_before_attempts() {
        let policy = CompressionPolicy::default();
        assert_eq!(
            policy.next_state(usize::MAX, MIN_QUALITY, MAX_ATTEMPTS),
            SearchState::QualityFloor
        );
        assert_eq!(
            policy.next_state(usize::MAX, Quality::new(70), MAX_ATTEMPTS),
            SearchState::AttemptsExhausted
        );
    }

    #[test]
    fn default_policy_constants() {
        let policy = CompressionPolicy::default();
        assert_eq!(policy.max_size_bytes, 819_200);
        assert_eq!(policy.min_quality.value(), 60);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.quality_step, 15);
        assert_eq!(DEFAULT_QUALITY, Quality::default());
    }

    // =========================================================================
    // compress tests
    // =========================================================================

    #[test]
    fn large_photo_converges_on_schedule() {
        // 4000x3000 original, width 1920; only quality 60 fits the budget
        let backend = MockBackend::with_size_fn((4000, 3000), |req| match req.quality.value() {
            85 => 2_000 * KB,
            70 => 900 * KB,
            _ => 700 * KB,
        });
        let request = jpeg_request().with_width(1920);

        let out = compress(
            &backend,
            &vec![0u8; 6_200 * KB],
            &request,
            &CompressionPolicy::default(),
        )
        .unwrap();

        assert_eq!(backend.qualities(), vec![85, 70, 60]);
        assert_eq!(out.state, SearchState::Converged);
        assert_eq!(out.attempts, 3);
        assert_eq!(out.result.quality.value(), 60);
        assert!(out.result.optimized_size() <= MAX_SIZE_BYTES);
        assert_eq!(out.result.dimensions.width, 1920);
        assert_eq!(out.result.dimensions.height, 1440);
    }

    #[test]
    fn first_attempt_within_budget() {
        let backend = MockBackend::with_size((200, 150), 40 * KB);

        let out = compress(
            &backend,
            &[0u8; 64],
            &jpeg_request(),
            &CompressionPolicy::default(),
        )
        .unwrap();

        assert_eq!(backend.encode_count(), 1);
        assert_eq!(out.state, SearchState::Converged);
        assert_eq!(out.result.quality.value(), 85);
    }

    #[test]
    fn quality_floor_returns_oversized_result() {
        let backend = MockBackend::with_size((4000, 3000), 5_000 * KB);

        let out = compress(
            &backend,
            &[0u8; 64],
            &jpeg_request(),
            &CompressionPolicy::default(),
        )
        .unwrap();

        assert_eq!(backend.qualities(), vec![85, 70, 60]);
        assert_eq!(out.state, SearchState::QualityFloor);
        assert_eq!(out.result.quality, MIN_QUALITY);
        assert!(out.result.optimized_size() > MAX_SIZE_BYTES);
    }

    #[test]
    fn attempts_exhausted_with_low_floor() {
        let backend = MockBackend::with_size((4000, 3000), 5_000 * KB);
        let policy = CompressionPolicy {
            min_quality: Quality::new(10),
            ..CompressionPolicy::default()
        };
        let request = jpeg_request().with_quality(Quality::new(100));

        let out = compress(&backend, &[0u8; 64], &request, &policy).unwrap();

        assert_eq!(backend.qualities(), vec![100, 85, 70, 55]);
        assert_eq!(out.state, SearchState::AttemptsExhausted);
        assert_eq!(out.attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn starting_at_100_hits_floor_on_fourth_attempt() {
        let backend = MockBackend::with_size((4000, 3000), 5_000 * KB);
        let request = jpeg_request().with_quality(Quality::new(100));

        let out = compress(&backend, &[0u8; 64], &request, &CompressionPolicy::default()).unwrap();

        assert_eq!(backend.qualities(), vec![100, 85, 70, 60]);
        assert_eq!(out.state, SearchState::QualityFloor);
    }

    #[test]
    fn starting_below_floor_stops_immediately() {
        let backend = MockBackend::with_size((800, 600), 5_000 * KB);
        let request = jpeg_request().with_quality(Quality::new(40));

        let out = compress(&backend, &[0u8; 64], &request, &CompressionPolicy::default()).unwrap();

        assert_eq!(backend.qualities(), vec![40]);
        assert_eq!(out.state, SearchState::QualityFloor);
    }

    #[test]
    fn latest_candidate_wins_even_if_larger() {
        let backend = MockBackend::with_size_fn((4000, 3000), |req| match req.quality.value() {
            85 => 900 * KB,
            70 => 1_000 * KB,
            _ => 1_100 * KB,
        });

        let out = compress(
            &backend,
            &[0u8; 64],
            &jpeg_request(),
            &CompressionPolicy::default(),
        )
        .unwrap();

        assert_eq!(out.result.optimized_size(), 1_100 * KB);
    }

    #[test]
    fn encode_error_propagates_without_retry() {
        let backend = MockBackend::with_size((800, 600), 10).failing_when(|_| true);

        let err = compress(
            &backend,
            &[0u8; 64],
            &jpeg_request(),
            &CompressionPolicy::default(),
        )
        .unwrap_err();

        assert!(matches!(err, BackendError::Encode(_)));
        assert_eq!(backend.encode_count(), 1);
    }

    #[test]
    fn error_on_later_attempt_propagates() {
        let backend = MockBackend::with_size((800, 600), 5_000 * KB)
            .failing_when(|req| req.quality.value() < 85);

        let err = compress(
            &backend,
            &[0u8; 64],
            &jpeg_request(),
            &CompressionPolicy::default(),
        )
        .unwrap_err();

        assert!(matches!(err, BackendError::Encode(_)));
        assert_eq!(backend.qualities(), vec![85, 70]);
    }

    #[test]
    fn budget_and_bound_hold_across_size_curves() {
        let budget = 100 * KB;
        let policy = CompressionPolicy {
            max_size_bytes: budget,
            ..CompressionPolicy::default()
        };

        // bytes per quality point
        for slope in [100usize, 1_000, 1_500, 2_000, 10_000] {
            for start in [60u32, 75, 85, 90, 100] {
                let backend = MockBackend::with_size_fn((1000, 1000), move |req| {
                    req.quality.value() as usize * slope
                });
                let request = jpeg_request().with_quality(Quality::new(start));

                let out = compress(&backend, &[0u8; 8], &request, &policy).unwrap();

                assert!(backend.encode_count() <= MAX_ATTEMPTS as usize);
                assert!(
                    out.result.optimized_size() <= budget
                        || out.result.quality == MIN_QUALITY
                        || out.attempts == MAX_ATTEMPTS,
                    "slope {slope}, start {start}: {:?}",
                    out.state
                );
            }
        }
    }
}

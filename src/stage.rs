//! Pluggable per-block processing.
//!
//! A stage receives the decoded left/right channel blocks and returns the
//! blocks to re-encode. Stages may keep state across calls (filter
//! memory, delay lines) since they are called with `&mut self` from a
//! single stream thread.

/// One DSP stage in the streaming pipeline.
pub trait ProcessingStage: Send {
    /// Processes one block of decoded samples in the range [-1.0, 1.0).
    ///
    /// Both vectors have the same length. Implementations may reuse the
    /// input allocations for the output.
    fn process(&mut self, left: Vec<f32>, right: Vec<f32>) -> (Vec<f32>, Vec<f32>);
}

impl<F> ProcessingStage for F
where
    F: FnMut(Vec<f32>, Vec<f32>) -> (Vec<f32>, Vec<f32>) + Send,
{
    fn process(&mut self, left: Vec<f32>, right: Vec<f32>) -> (Vec<f32>, Vec<f32>) {
        self(left, right)
    }
}

/// Swaps the left and right channels. The reference stage: its effect is
/// audible on any stereo source and trivially verifiable in a file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwapChannels;

impl ProcessingStage for SwapChannels {
    fn process(&mut self, left: Vec<f32>, right: Vec<f32>) -> (Vec<f32>, Vec<f32>) {
        (right, left)
    }
}

/// Forwards both channels unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ProcessingStage for Passthrough {
    fn process(&mut self, left: Vec<f32>, right: Vec<f32>) -> (Vec<f32>, Vec<f32>) {
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_channels() {
        let mut stage = SwapChannels;
        let (left, right) = stage.process(vec![0.1, 0.2], vec![-0.3, -0.4]);
        assert_eq!(left, vec![-0.3, -0.4]);
        assert_eq!(right, vec![0.1, 0.2]);
    }

    #[test]
    fn test_passthrough_keeps_order() {
        let mut stage = Passthrough;
        let (left, right) = stage.process(vec![0.5], vec![-0.5]);
        assert_eq!(left, vec![0.5]);
        assert_eq!(right, vec![-0.5]);
    }

    #[test]
    fn test_closure_stage_with_state() {
        let mut gain = 1.0f32;
        let mut stage = move |left: Vec<f32>, right: Vec<f32>| {
            gain *= 0.5;
            let l = left.iter().map(|s| s * gain).collect();
            let r = right.iter().map(|s| s * gain).collect();
            (l, r)
        };
        let (l, _) = stage.process(vec![1.0], vec![1.0]);
        assert_eq!(l, vec![0.5]);
        let (l, _) = stage.process(vec![1.0], vec![1.0]);
        assert_eq!(l, vec![0.25]);
    }
}
